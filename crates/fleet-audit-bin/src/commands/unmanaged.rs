//! Management coverage audit.

use super::{active_states, primary_fetcher, secondary_fetcher, Backends, GlobalOptions};
use crate::error::CliError;
use crate::output::{self, divider, OutputFormat};
use anyhow::Result;
use audit_config_and_utils::Config;
use chrono::{DateTime, Utc};
use fleet_inventory::{
    AuditOptions, AuditReport, Filters, FleetAuditor, Region, RegionEnumerator,
};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default)]
pub struct UnmanagedArgs {
    pub regions: Vec<String>,
    pub default_region: Option<String>,
    pub concurrency: Option<usize>,
}

#[derive(Serialize)]
struct AuditOutput<'a> {
    generated_at: DateTime<Utc>,
    account_id: &'a str,
    #[serde(flatten)]
    report: &'a AuditReport,
}

/// Find instances the management service does not know about.
pub async fn unmanaged(
    args: UnmanagedArgs,
    global: &GlobalOptions,
    config: &Config,
) -> Result<()> {
    let backends = Backends::connect(global, config)?;
    let account_id = backends.verify_session().await?;

    let options = AuditOptions {
        concurrency: args.concurrency.unwrap_or(config.concurrency).max(1),
        primary_filters: Filters::active_states(&active_states(config)?),
        secondary_filters: Filters::managed_instances(),
    };
    let auditor = FleetAuditor::new(
        RegionEnumerator::new(backends.regions.clone()),
        primary_fetcher(&backends, config),
        secondary_fetcher(&backends, config),
        options,
    );

    let explicit = (!args.regions.is_empty())
        .then(|| args.regions.iter().map(|r| Region::new(r.as_str())).collect());
    let default_region = args
        .default_region
        .or_else(|| config.default_region.clone())
        .map(Region::new);

    let report = auditor
        .run(explicit, default_region.as_ref())
        .await
        .map_err(CliError::Discovery)?;

    match global.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => output::print_json(&AuditOutput {
            generated_at: Utc::now(),
            account_id: &account_id,
            report: &report,
        })?,
    }

    Ok(())
}

fn render_text(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<18} {:>10} {:>10} {:>10}",
        "Region", "Instances", "Managed", "Unmanaged"
    );
    let _ = writeln!(out, "{}", divider(51));

    for region in &report.regions {
        let marker = if region.is_partial() { " *" } else { "" };
        let _ = writeln!(
            out,
            "{:<18} {:>10} {:>10} {:>10}{}",
            region.region.as_str(),
            region.result.primary_count,
            region.result.secondary_count,
            region.result.unmanaged_count,
            marker
        );
        for id in &region.result.unmanaged {
            let _ = writeln!(out, "    {id}");
        }
    }

    let summary = &report.summary;
    let _ = writeln!(out, "{}", divider(51));
    let _ = writeln!(
        out,
        "{:<18} {:>10} {:>10} {:>10}",
        format!("Total ({})", summary.region_count),
        summary.primary_count,
        summary.secondary_count,
        summary.unmanaged_count
    );

    let partial: Vec<_> = report.partial_regions().collect();
    if !partial.is_empty() {
        let _ = writeln!(out, "\n* incomplete inventory, counts may be low:");
        for region in partial {
            for warning in &region.warnings {
                let _ = writeln!(out, "  {}: {}", region.region, warning);
            }
        }
    }

    out
}

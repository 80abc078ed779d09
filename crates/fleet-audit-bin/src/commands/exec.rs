//! Run a shell command on instances in one region.

use super::{active_states, primary_fetcher, Backends, GlobalOptions};
use crate::error::CliError;
use crate::output::{self, divider, OutputFormat};
use anyhow::Result;
use audit_config_and_utils::Config;
use chrono::{DateTime, Utc};
use fleet_inventory::{Filters, Region};
use remote_command_runner::{
    CancellationToken, CommandDispatcher, CommandPoller, CommandRunner, CommandSpec,
    PollerConfig, ResultExtraction, RetryPolicy, RunReport, RunnerOptions, UnexpectedErrorPolicy,
    COMMANDS_PARAMETER,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ExecArgs {
    pub region: Option<String>,
    pub instances: Vec<String>,
    pub commands: Vec<String>,
    pub document: Option<String>,
    pub full_output: bool,
    pub fail_fast: bool,
    pub max_wait_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

#[derive(Serialize)]
struct ExecOutput<'a> {
    generated_at: DateTime<Utc>,
    region: &'a Region,
    document: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Dispatch a command and collect one result string per instance.
pub async fn exec(args: ExecArgs, global: &GlobalOptions, config: &Config) -> Result<()> {
    let region = args
        .region
        .clone()
        .or_else(|| config.default_region.clone())
        .map(Region::new)
        .ok_or_else(|| CliError::setup("no region given and no default region configured"))?;

    let backends = Backends::connect(global, config)?;
    let executor = backends.commands(&region)?;
    backends.verify_session().await?;

    let instances = if args.instances.is_empty() {
        region_instances(&backends, config, &region).await?
    } else {
        args.instances.clone()
    };

    let spec = command_spec(&args, config);
    let runner = CommandRunner::new(
        CommandDispatcher::new(
            executor.clone(),
            RetryPolicy::new(config.retry.max_retries, config.retry.delay()),
        ),
        CommandPoller::new(executor, poller_config(&args, config)),
        RunnerOptions {
            concurrency: args.concurrency.unwrap_or(config.concurrency).max(1),
            on_unexpected_error: if args.fail_fast {
                UnexpectedErrorPolicy::Abort
            } else {
                UnexpectedErrorPolicy::SkipInstance
            },
        },
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling in-flight commands");
            on_interrupt.cancel();
        }
    });

    let outcome = runner.run_on_instances(&instances, &spec, &cancel).await;
    interrupt.abort();

    // Only the abort policy surfaces an error here.
    let report = outcome.map_err(CliError::Aborted)?;

    match global.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => output::print_json(&ExecOutput {
            generated_at: Utc::now(),
            region: &region,
            document: &spec.document_name,
            report: &report,
        })?,
    }

    Ok(())
}

/// Every active instance in the region's compute inventory, sorted.
async fn region_instances(
    backends: &Backends,
    config: &Config,
    region: &Region,
) -> Result<Vec<String>, CliError> {
    let filters = Filters::active_states(&active_states(config)?);
    let outcome = primary_fetcher(backends, config).fetch(region, &filters).await;

    if let Some(err) = &outcome.error {
        if outcome.ids.is_empty() {
            return Err(CliError::setup(format!("cannot list instances in {region}: {err}")));
        }
        warn!(region = %region, error = %err, "instance list incomplete");
    }

    let mut ids: Vec<String> = outcome.ids.into_iter().collect();
    ids.sort();
    Ok(ids)
}

fn command_spec(args: &ExecArgs, config: &Config) -> CommandSpec {
    let document = args
        .document
        .clone()
        .unwrap_or_else(|| config.command.document_name.clone());
    let commands = if args.commands.is_empty() {
        config.command.default_commands.clone()
    } else {
        args.commands.clone()
    };
    CommandSpec::new(document).with_parameter(COMMANDS_PARAMETER, commands)
}

fn poller_config(args: &ExecArgs, config: &Config) -> PollerConfig {
    PollerConfig {
        interval: config.poll.interval(),
        max_wait: args
            .max_wait_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.poll.max_wait()),
        max_output_pages: config.poll.max_output_pages,
        extraction: if args.full_output {
            ResultExtraction::FullOutput
        } else {
            ResultExtraction::FirstLine
        },
    }
}

fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<22} {}", "Instance", "Result");
    let _ = writeln!(out, "{}", divider(60));
    for entry in &report.results {
        let mut lines = entry.result.lines();
        let _ = writeln!(out, "{:<22} {}", entry.instance_id, lines.next().unwrap_or_default());
        for line in lines {
            let _ = writeln!(out, "{:<22} {}", "", line);
        }
    }
    let _ = writeln!(out, "{}", divider(60));
    let _ = writeln!(
        out,
        "{} of {} succeeded",
        report.succeeded(),
        report.results.len()
    );
    out
}

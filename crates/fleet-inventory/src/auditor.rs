//! Multi-region coverage audit.
//!
//! Regions are independent: each one is fetched and reconciled on its own,
//! up to `concurrency` at a time, and totals are computed once every region
//! has finished.

use crate::error::InventoryResult;
use crate::fetcher::InventoryFetcher;
use crate::reconciliation::{aggregate, reconcile, AuditSummary, ReconciliationResult};
use crate::regions::RegionEnumerator;
use crate::types::{Filters, InstanceState, Region};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

/// Filters and pool size for an audit run.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub concurrency: usize,
    pub primary_filters: Filters,
    pub secondary_filters: Filters,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            primary_filters: Filters::active_states(&InstanceState::DEFAULT_ACTIVE),
            secondary_filters: Filters::managed_instances(),
        }
    }
}

/// Outcome for one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub region: Region,
    #[serde(flatten)]
    pub result: ReconciliationResult,
    /// Non-fatal fetch problems; counts may be incomplete when present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RegionReport {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Per-region reports in scan order, plus totals.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub regions: Vec<RegionReport>,
    pub summary: AuditSummary,
}

impl AuditReport {
    pub fn partial_regions(&self) -> impl Iterator<Item = &RegionReport> {
        self.regions.iter().filter(|report| report.is_partial())
    }
}

/// Drives region discovery, both inventory fetches and reconciliation.
pub struct FleetAuditor {
    regions: RegionEnumerator,
    primary: InventoryFetcher,
    secondary: InventoryFetcher,
    options: AuditOptions,
}

impl FleetAuditor {
    pub fn new(
        regions: RegionEnumerator,
        primary: InventoryFetcher,
        secondary: InventoryFetcher,
        options: AuditOptions,
    ) -> Self {
        Self {
            regions,
            primary,
            secondary,
            options,
        }
    }

    /// Audit every resolved region.
    ///
    /// Fails only when no region list can be produced; per-region fetch
    /// failures end up as warnings on that region's report.
    pub async fn run(
        &self,
        explicit_regions: Option<Vec<Region>>,
        default_region: Option<&Region>,
    ) -> InventoryResult<AuditReport> {
        let regions = self.regions.resolve(explicit_regions, default_region).await?;
        info!(
            regions = regions.len(),
            concurrency = self.options.concurrency,
            "starting coverage audit"
        );

        let reports: Vec<RegionReport> = stream::iter(regions)
            .map(|region| self.audit_region(region))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let summary = aggregate(reports.iter().map(|r| (&r.region, &r.result)));
        info!(
            regions = summary.region_count,
            unmanaged = summary.unmanaged_count,
            "coverage audit complete"
        );

        Ok(AuditReport {
            regions: reports,
            summary,
        })
    }

    /// Fetch both inventories for `region` and reconcile them.
    pub async fn audit_region(&self, region: Region) -> RegionReport {
        let (primary, secondary) = futures_util::join!(
            self.primary.fetch(&region, &self.options.primary_filters),
            self.secondary.fetch(&region, &self.options.secondary_filters),
        );

        let mut warnings = Vec::new();
        for (fetcher, outcome) in [(&self.primary, &primary), (&self.secondary, &secondary)] {
            if let Some(err) = &outcome.error {
                warnings.push(format!("{} inventory incomplete: {}", fetcher.source(), err));
            }
        }

        let result = reconcile(&primary.ids, &secondary.ids);

        if warnings.is_empty() {
            info!(
                region = %region,
                primary = result.primary_count,
                managed = result.secondary_count,
                unmanaged = result.unmanaged_count,
                "region reconciled"
            );
        } else {
            warn!(
                region = %region,
                primary = result.primary_count,
                managed = result.secondary_count,
                unmanaged = result.unmanaged_count,
                warnings = warnings.len(),
                "region reconciled from partial inventory"
            );
        }

        RegionReport {
            region,
            result,
            warnings,
        }
    }
}

//! Set reconciliation between the compute inventory and the managed
//! inventory.

use crate::types::Region;
use serde::Serialize;
use std::collections::HashSet;

/// Coverage of one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub primary_count: usize,
    pub secondary_count: usize,
    pub unmanaged_count: usize,
    /// Identifiers present in the primary inventory only, sorted.
    pub unmanaged: Vec<String>,
}

/// An unmanaged identifier tagged with the region it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedInstance {
    pub region: Region,
    pub instance_id: String,
}

/// Totals across every scanned region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub region_count: usize,
    pub primary_count: usize,
    pub secondary_count: usize,
    pub unmanaged_count: usize,
    pub unmanaged: Vec<UnmanagedInstance>,
}

/// `primary − secondary`, sorted, with the three counts.
///
/// Secondary identifiers absent from the primary inventory do not affect the
/// unmanaged count.
pub fn reconcile(primary: &HashSet<String>, secondary: &HashSet<String>) -> ReconciliationResult {
    let mut unmanaged: Vec<String> = primary.difference(secondary).cloned().collect();
    unmanaged.sort();

    ReconciliationResult {
        primary_count: primary.len(),
        secondary_count: secondary.len(),
        unmanaged_count: unmanaged.len(),
        unmanaged,
    }
}

/// Sum per-region results in the order given.
///
/// Identifiers are region-scoped, so the same identifier in two regions is
/// counted twice.
pub fn aggregate<'a, I>(results: I) -> AuditSummary
where
    I: IntoIterator<Item = (&'a Region, &'a ReconciliationResult)>,
{
    let mut summary = AuditSummary::default();

    for (region, result) in results {
        summary.region_count += 1;
        summary.primary_count += result.primary_count;
        summary.secondary_count += result.secondary_count;
        summary.unmanaged_count += result.unmanaged_count;
        summary
            .unmanaged
            .extend(result.unmanaged.iter().map(|id| UnmanagedInstance {
                region: region.clone(),
                instance_id: id.clone(),
            }));
    }

    summary
}

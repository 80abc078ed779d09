//! Capability traits implemented by inventory backends.
//!
//! Components receive these as `Arc<dyn …>` so a run can be wired to a real
//! provider or to in-memory doubles.

use crate::error::InventoryResult;
use crate::types::{Filters, Page, Region};
use async_trait::async_trait;

/// Lists the regions available to the current account.
#[async_trait]
pub trait RegionLister: Send + Sync {
    async fn list_regions(&self, include_disabled: bool) -> InventoryResult<Vec<Region>>;
}

/// Paginated instance listing scoped to one region.
///
/// The same shape serves the compute inventory and the managed inventory.
#[async_trait]
pub trait InstanceLister: Send + Sync {
    /// Short label used in logs, e.g. "ec2" or "ssm".
    fn source(&self) -> &str;

    async fn list_page(
        &self,
        region: &Region,
        filters: &Filters,
        page_token: Option<&str>,
    ) -> InventoryResult<Page>;
}

/// Confirms that credentials resolve to a usable session.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    /// Returns the account identifier the session belongs to.
    async fn verify_session(&self) -> InventoryResult<String>;
}

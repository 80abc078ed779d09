//! # Fleet inventory
//!
//! Collects instance identifiers from two independent inventories in every
//! region of an account and reports which instances the management service
//! does not know about.
//!
//! ## Flow
//!
//! ```text
//! RegionEnumerator ──► regions
//!                        │ (bounded worker pool)
//!                        ▼
//!        primary fetch ─┬─ secondary fetch
//!                        ▼
//!                   reconcile ──► RegionReport ──► aggregate ──► AuditSummary
//! ```
//!
//! Provider access goes through the traits in [`capability`]; live backends
//! live in their own crate and [`snapshot`] replays an exported inventory.
//!
//! ## Crate Structure
//!
//! - [`types`] - Regions, records, pages and filters
//! - [`capability`] - Listing and session traits
//! - [`regions`] - Region discovery
//! - [`fetcher`] - Paginated identifier collection
//! - [`reconciliation`] - Set difference and totals
//! - [`auditor`] - Multi-region audit driver
//! - [`snapshot`] - Offline backend

pub mod auditor;
pub mod capability;
pub mod error;
pub mod fetcher;
pub mod reconciliation;
pub mod regions;
pub mod snapshot;
pub mod types;

pub use auditor::{AuditOptions, AuditReport, FleetAuditor, RegionReport};
pub use capability::{InstanceLister, RegionLister, SessionProbe};
pub use error::{InventoryError, InventoryResult};
pub use fetcher::{FetchOutcome, InventoryFetcher, DEFAULT_MAX_PAGES};
pub use reconciliation::{
    aggregate, reconcile, AuditSummary, ReconciliationResult, UnmanagedInstance,
};
pub use regions::RegionEnumerator;
pub use snapshot::{InventorySnapshot, SnapshotBackend, SnapshotInstances};
pub use types::{
    Filter, Filters, InstanceIdFormat, InstanceRecord, InstanceState, Page, Region,
    EC2_RESOURCE_TYPE, RESOURCE_TYPE_FILTER, STATE_FILTER,
};

#[cfg(test)]
mod tests;

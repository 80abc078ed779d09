//! Offline inventory backend.
//!
//! Serves a previously exported inventory snapshot through the same
//! capability traits as a live backend, page by page, so an audit can be
//! replayed without provider access.

use crate::capability::{InstanceLister, RegionLister, SessionProbe};
use crate::error::{InventoryError, InventoryResult};
use crate::types::{Filters, InstanceRecord, Page, Region, RESOURCE_TYPE_FILTER, STATE_FILTER};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_SNAPSHOT_PAGE_SIZE: usize = 50;

/// A managed-inventory entry as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntry {
    pub instance_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

/// Both inventories of one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub managed: Vec<ManagedEntry>,
}

impl RegionSnapshot {
    fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Exported inventory for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub account_id: Option<String>,
    pub regions: Vec<RegionSnapshot>,
}

impl InventorySnapshot {
    pub fn load(path: &Path) -> InventoryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            InventoryError::backend("snapshot_unreadable", format!("{}: {err}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> InventoryResult<Self> {
        serde_json::from_str(content)
            .map_err(|err| InventoryError::backend("snapshot_invalid", err.to_string()))
    }

    fn region(&self, region: &Region) -> InventoryResult<&RegionSnapshot> {
        self.regions
            .iter()
            .find(|r| r.name == region.as_str())
            .ok_or_else(|| {
                InventoryError::backend("InvalidRegion", format!("region {region} not in snapshot"))
            })
    }
}

/// Capability backend over an [`InventorySnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotBackend {
    snapshot: Arc<InventorySnapshot>,
    page_size: usize,
}

impl SnapshotBackend {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            page_size: DEFAULT_SNAPSHOT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Lister over the compute inventory.
    pub fn primary(&self) -> SnapshotInstances {
        SnapshotInstances {
            backend: self.clone(),
            managed: false,
        }
    }

    /// Lister over the managed inventory.
    pub fn managed(&self) -> SnapshotInstances {
        SnapshotInstances {
            backend: self.clone(),
            managed: true,
        }
    }

    fn page_of(
        &self,
        records: Vec<InstanceRecord>,
        page_token: Option<&str>,
    ) -> InventoryResult<Page> {
        let start = match page_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                InventoryError::backend("InvalidNextToken", format!("bad token {token}"))
            })?,
        };
        let end = (start + self.page_size).min(records.len());
        let next_token = (end < records.len()).then(|| end.to_string());

        Ok(Page {
            records: records.get(start..end).unwrap_or_default().to_vec(),
            next_token,
        })
    }
}

#[async_trait]
impl RegionLister for SnapshotBackend {
    async fn list_regions(&self, include_disabled: bool) -> InventoryResult<Vec<Region>> {
        Ok(self
            .snapshot
            .regions
            .iter()
            .filter(|r| include_disabled || r.is_enabled())
            .map(|r| Region::new(r.name.clone()))
            .collect())
    }
}

#[async_trait]
impl SessionProbe for SnapshotBackend {
    async fn verify_session(&self) -> InventoryResult<String> {
        Ok(self
            .snapshot
            .account_id
            .clone()
            .unwrap_or_else(|| "snapshot".to_string()))
    }
}

/// One inventory view of a [`SnapshotBackend`].
#[derive(Debug, Clone)]
pub struct SnapshotInstances {
    backend: SnapshotBackend,
    managed: bool,
}

#[async_trait]
impl InstanceLister for SnapshotInstances {
    fn source(&self) -> &str {
        if self.managed {
            "snapshot-managed"
        } else {
            "snapshot-instances"
        }
    }

    async fn list_page(
        &self,
        region: &Region,
        filters: &Filters,
        page_token: Option<&str>,
    ) -> InventoryResult<Page> {
        let snapshot = self.backend.snapshot.region(region)?;

        let records: Vec<InstanceRecord> = if self.managed {
            snapshot
                .managed
                .iter()
                .filter(|entry| match &entry.resource_type {
                    Some(kind) => filters.allows(RESOURCE_TYPE_FILTER, kind),
                    None => true,
                })
                .map(|entry| InstanceRecord {
                    instance_id: entry.instance_id.clone(),
                    state: None,
                })
                .collect()
        } else {
            snapshot
                .instances
                .iter()
                .filter(|record| match record.state {
                    Some(state) => filters.allows(STATE_FILTER, state.as_str()),
                    None => true,
                })
                .cloned()
                .collect()
        };

        self.backend.page_of(records, page_token)
    }
}

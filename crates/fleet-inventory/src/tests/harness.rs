//! In-memory capability doubles.
//!
//! Provides:
//! - FakeRegions: a region lister with a fixed answer
//! - FakeInventory: per-region records served in fixed-size pages, with
//!   optional per-region failures and an in-flight gauge

use crate::auditor::{AuditOptions, FleetAuditor};
use crate::capability::{InstanceLister, RegionLister};
use crate::error::{InventoryError, InventoryResult};
use crate::fetcher::InventoryFetcher;
use crate::regions::RegionEnumerator;
use crate::types::{Filters, InstanceRecord, InstanceState, Page, Region, STATE_FILTER};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeRegions {
    result: InventoryResult<Vec<Region>>,
}

impl FakeRegions {
    pub fn listing(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(names.iter().map(|n| Region::from(*n)).collect()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(InventoryError::backend("UnauthorizedOperation", message)),
        })
    }
}

#[async_trait]
impl RegionLister for FakeRegions {
    async fn list_regions(&self, _include_disabled: bool) -> InventoryResult<Vec<Region>> {
        self.result.clone()
    }
}

/// How a region misbehaves.
#[derive(Debug, Clone)]
pub enum RegionFault {
    /// Fail every call.
    Always(InventoryError),
    /// Serve the first page, then fail.
    AfterFirstPage(InventoryError),
}

pub struct FakeInventory {
    label: &'static str,
    page_size: usize,
    regions: HashMap<String, Vec<InstanceRecord>>,
    faults: HashMap<String, RegionFault>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeInventory {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            page_size: 2,
            regions: HashMap::new(),
            faults: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Running instances with the given identifiers.
    pub fn region(self, name: &str, ids: &[&str]) -> Self {
        let records = ids.iter().map(|id| InstanceRecord::running(*id)).collect();
        self.records(name, records)
    }

    pub fn records(mut self, name: &str, records: Vec<InstanceRecord>) -> Self {
        self.regions.insert(name.to_string(), records);
        self
    }

    pub fn fault(mut self, name: &str, fault: RegionFault) -> Self {
        self.faults.insert(name.to_string(), fault);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn regions_called(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn page(
        &self,
        region: &Region,
        filters: &Filters,
        token: Option<&str>,
    ) -> InventoryResult<Page> {
        let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);

        match self.faults.get(region.as_str()) {
            Some(RegionFault::Always(err)) => return Err(err.clone()),
            Some(RegionFault::AfterFirstPage(err)) if start > 0 => return Err(err.clone()),
            _ => {}
        }

        let records: Vec<InstanceRecord> = self
            .regions
            .get(region.as_str())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| match r.state {
                Some(state) => filters.allows(STATE_FILTER, state.as_str()),
                None => true,
            })
            .collect();

        let end = (start + self.page_size).min(records.len());
        let slice = records[start..end].to_vec();
        if end < records.len() {
            Ok(Page::with_next(slice, end.to_string()))
        } else {
            Ok(Page::last(slice))
        }
    }
}

#[async_trait]
impl InstanceLister for FakeInventory {
    fn source(&self) -> &str {
        self.label
    }

    async fn list_page(
        &self,
        region: &Region,
        filters: &Filters,
        page_token: Option<&str>,
    ) -> InventoryResult<Page> {
        if page_token.is_none() {
            self.calls.lock().unwrap().push(region.to_string());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let page = self.page(region, filters, page_token);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        page
    }
}

pub fn auditor(
    regions: Arc<FakeRegions>,
    primary: Arc<FakeInventory>,
    secondary: Arc<FakeInventory>,
    concurrency: usize,
) -> FleetAuditor {
    FleetAuditor::new(
        RegionEnumerator::new(regions),
        InventoryFetcher::new(primary),
        InventoryFetcher::new(secondary),
        AuditOptions {
            concurrency,
            ..AuditOptions::default()
        },
    )
}

pub fn stopped(id: &str) -> InstanceRecord {
    InstanceRecord::new(id, Some(InstanceState::Stopped))
}

pub fn terminated(id: &str) -> InstanceRecord {
    InstanceRecord::new(id, Some(InstanceState::Terminated))
}

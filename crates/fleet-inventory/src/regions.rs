//! Region discovery.

use crate::capability::RegionLister;
use crate::error::{InventoryError, InventoryResult};
use crate::types::Region;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides which regions a run scans.
#[derive(Clone)]
pub struct RegionEnumerator {
    lister: Arc<dyn RegionLister>,
}

impl RegionEnumerator {
    pub fn new(lister: Arc<dyn RegionLister>) -> Self {
        Self { lister }
    }

    /// Resolve the regions to scan.
    ///
    /// An explicit list is returned verbatim. Otherwise the enabled regions
    /// are listed and sorted. When listing fails, `default_region` is used
    /// alone; without one the run cannot proceed.
    pub async fn resolve(
        &self,
        explicit: Option<Vec<Region>>,
        default_region: Option<&Region>,
    ) -> InventoryResult<Vec<Region>> {
        if let Some(regions) = explicit {
            debug!(count = regions.len(), "using explicit region list");
            return Ok(regions);
        }

        match self.lister.list_regions(false).await {
            Ok(mut regions) => {
                regions.sort();
                debug!(count = regions.len(), "discovered regions");
                Ok(regions)
            }
            Err(err) => match default_region {
                Some(fallback) => {
                    warn!(
                        error = %err,
                        fallback = %fallback,
                        "region discovery failed, scanning default region only"
                    );
                    Ok(vec![fallback.clone()])
                }
                None => Err(InventoryError::RegionDiscoveryFailed(err.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticRegions {
        result: InventoryResult<Vec<Region>>,
        calls: AtomicUsize,
    }

    impl StaticRegions {
        fn new(result: InventoryResult<Vec<Region>>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RegionLister for StaticRegions {
        async fn list_regions(&self, include_disabled: bool) -> InventoryResult<Vec<Region>> {
            assert!(!include_disabled);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn regions(names: &[&str]) -> Vec<Region> {
        names.iter().map(|n| Region::from(*n)).collect()
    }

    #[tokio::test]
    async fn discovered_regions_are_sorted() {
        let lister = StaticRegions::new(Ok(regions(&["us-west-2", "eu-west-1", "ap-south-1"])));
        let enumerator = RegionEnumerator::new(lister);

        let resolved = enumerator.resolve(None, None).await.unwrap();
        assert_eq!(resolved, regions(&["ap-south-1", "eu-west-1", "us-west-2"]));
    }

    #[tokio::test]
    async fn explicit_list_is_returned_verbatim_without_listing() {
        let lister = StaticRegions::new(Ok(regions(&["eu-west-1"])));
        let enumerator = RegionEnumerator::new(lister.clone());

        let explicit = regions(&["us-west-2", "eu-west-1", "us-west-2"]);
        let resolved = enumerator.resolve(Some(explicit.clone()), None).await.unwrap();

        assert_eq!(resolved, explicit);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_failure_falls_back_to_default_region() {
        let lister = StaticRegions::new(Err(InventoryError::backend("AuthFailure", "nope")));
        let enumerator = RegionEnumerator::new(lister);

        let fallback = Region::from("eu-central-1");
        let resolved = enumerator.resolve(None, Some(&fallback)).await.unwrap();
        assert_eq!(resolved, vec![fallback]);
    }

    #[tokio::test]
    async fn listing_failure_without_default_is_discovery_failure() {
        let lister = StaticRegions::new(Err(InventoryError::backend("AuthFailure", "nope")));
        let enumerator = RegionEnumerator::new(lister);

        let err = enumerator.resolve(None, None).await.unwrap_err();
        assert!(matches!(err, InventoryError::RegionDiscoveryFailed(_)));
        assert!(err.to_string().contains("nope"));
    }
}

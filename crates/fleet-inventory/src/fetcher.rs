//! Paginated identifier collection.

use crate::capability::InstanceLister;
use crate::error::InventoryError;
use crate::types::{Filters, InstanceIdFormat, Region, STATE_FILTER};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on pages read from one region.
pub const DEFAULT_MAX_PAGES: usize = 1_000;

/// Identifiers collected from one region, plus how the walk ended.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub ids: HashSet<String>,
    /// Pages successfully read.
    pub pages: usize,
    /// Records dropped as malformed, inactive or wrongly formatted.
    pub skipped: usize,
    /// Set when pagination stopped early; `ids` then holds what was read
    /// before the failure.
    pub error: Option<InventoryError>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Walks a listing capability page by page and accumulates a deduplicated
/// identifier set.
#[derive(Clone)]
pub struct InventoryFetcher {
    lister: Arc<dyn InstanceLister>,
    id_format: Option<InstanceIdFormat>,
    max_pages: usize,
}

impl InventoryFetcher {
    pub fn new(lister: Arc<dyn InstanceLister>) -> Self {
        Self {
            lister,
            id_format: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Only accept identifiers matching `format`.
    pub fn with_id_format(mut self, format: InstanceIdFormat) -> Self {
        self.id_format = Some(format);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn source(&self) -> &str {
        self.lister.source()
    }

    /// Collect every identifier in `region` matching `filters`.
    ///
    /// Never fails outright: a backend error ends pagination and is returned
    /// in [`FetchOutcome::error`] alongside the identifiers read so far.
    pub async fn fetch(&self, region: &Region, filters: &Filters) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let mut page_token: Option<String> = None;
        let mut seen_tokens: HashSet<String> = HashSet::new();

        loop {
            if outcome.pages >= self.max_pages {
                outcome.error = Some(InventoryError::PageLimitExceeded {
                    region: region.to_string(),
                    max_pages: self.max_pages,
                });
                break;
            }

            let page = match self
                .lister
                .list_page(region, filters, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    outcome.error = Some(err);
                    break;
                }
            };
            outcome.pages += 1;

            for record in page.records {
                let Some(id) = record.instance_id else {
                    outcome.skipped += 1;
                    continue;
                };

                if let Some(state) = record.state {
                    if !filters.allows(STATE_FILTER, state.as_str()) {
                        outcome.skipped += 1;
                        continue;
                    }
                }

                if let Some(format) = &self.id_format {
                    if !format.matches(&id) {
                        debug!(
                            source = self.lister.source(),
                            region = %region,
                            instance_id = %id,
                            "dropping identifier with foreign format"
                        );
                        outcome.skipped += 1;
                        continue;
                    }
                }

                outcome.ids.insert(id);
            }

            match page.next_token.filter(|token| !token.is_empty()) {
                None => break,
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        outcome.error = Some(InventoryError::RepeatedPageToken {
                            region: region.to_string(),
                        });
                        break;
                    }
                    page_token = Some(token);
                }
            }
        }

        if let Some(err) = &outcome.error {
            warn!(
                source = self.lister.source(),
                region = %region,
                collected = outcome.ids.len(),
                pages = outcome.pages,
                error = %err,
                "inventory fetch stopped early, keeping partial result"
            );
        } else {
            debug!(
                source = self.lister.source(),
                region = %region,
                collected = outcome.ids.len(),
                pages = outcome.pages,
                skipped = outcome.skipped,
                "inventory fetch complete"
            );
        }

        outcome
    }
}

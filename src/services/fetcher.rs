// src/services/fetcher.rs

//! Full-collection fetcher.
//!
//! Walks upstream pages for one partition until the data runs out. The
//! directory pads past its last record with `null`s instead of signalling the
//! end, so a page that is empty, all-invalid, or short of a full page ends
//! the walk. A run of consecutive failed pages also ends it, with whatever was
//! collected so far.

use std::fmt;
use std::sync::Arc;

use crate::models::{NormalizedInstitution, UpstreamConfig};
use crate::services::Normalizer;
use crate::services::upstream::{
    DISTRICT_HEADER, DirectorySource, Endpoint, OFFSET_HEADER, STATE_HEADER,
};

/// The dimension a full collection is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    State(String),
    District(String),
}

impl Partition {
    /// Cache key: `state:<name>` or `district:<name>`.
    pub fn cache_key(&self) -> String {
        match self {
            Partition::State(name) => format!("state:{name}"),
            Partition::District(name) => format!("district:{name}"),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Partition::State(_) => Endpoint::CollegesByState,
            Partition::District(_) => Endpoint::CollegesByDistrict,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Partition::State(name) | Partition::District(name) => name,
        }
    }

    fn header(&self) -> &'static str {
        match self {
            Partition::State(_) => STATE_HEADER,
            Partition::District(_) => DISTRICT_HEADER,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Result of walking one partition.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub institutions: Vec<NormalizedInstitution>,
    pub pages_requested: usize,
    pub failed_pages: usize,
    /// Reached the end of data without skipping any page.
    pub complete: bool,
}

impl FetchReport {
    /// Nothing was collected and the directory failed along the way.
    pub fn upstream_unavailable(&self) -> bool {
        self.institutions.is_empty() && self.failed_pages > 0
    }
}

/// Materializes every record of a partition, one page at a time.
pub struct CollectionFetcher {
    source: Arc<dyn DirectorySource>,
    normalizer: Arc<Normalizer>,
    page_size: usize,
    max_consecutive_failures: u32,
    max_pages: usize,
}

impl CollectionFetcher {
    pub fn new(
        source: Arc<dyn DirectorySource>,
        normalizer: Arc<Normalizer>,
        config: &UpstreamConfig,
    ) -> Self {
        Self {
            source,
            normalizer,
            page_size: config.page_size.max(1),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Fetch and normalize the whole partition.
    ///
    /// Pages are requested sequentially since each page decides whether the
    /// next is needed. A failed page is skipped rather than re-requested.
    pub async fn fetch_all(&self, partition: &Partition) -> FetchReport {
        let mut report = FetchReport::default();
        let mut offset = 0usize;
        let mut consecutive_failures = 0u32;
        let mut reached_end = false;

        while report.pages_requested < self.max_pages {
            let headers = [
                (partition.header(), partition.value().to_string()),
                (OFFSET_HEADER, offset.to_string()),
            ];
            report.pages_requested += 1;

            let page = match self.source.fetch_page(partition.endpoint(), &headers).await {
                Ok(page) => page,
                Err(e) => {
                    report.failed_pages += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.max_consecutive_failures {
                        log::warn!(
                            "{}: {} consecutive page failures at offset {}, stopping with {} records: {}",
                            partition,
                            consecutive_failures,
                            offset,
                            report.institutions.len(),
                            e
                        );
                        break;
                    }
                    offset += self.page_size;
                    continue;
                }
            };
            consecutive_failures = 0;

            if page.is_empty() {
                reached_end = true;
                break;
            }

            let valid: Vec<_> = page
                .iter()
                .filter_map(|entry| self.normalizer.normalize(entry))
                .collect();
            let valid_count = valid.len();
            if valid_count < page.len() {
                log::debug!(
                    "{}: dropped {} invalid entries at offset {}",
                    partition,
                    page.len() - valid_count,
                    offset
                );
            }
            if valid_count == 0 {
                reached_end = true;
                break;
            }

            report.institutions.extend(valid);

            if valid_count < self.page_size {
                reached_end = true;
                break;
            }
            offset += self.page_size;
        }

        if !reached_end && consecutive_failures < self.max_consecutive_failures {
            log::warn!(
                "{}: stopped at the {} page limit with {} records",
                partition,
                self.max_pages,
                report.institutions.len()
            );
        }

        report.complete = reached_end && report.failed_pages == 0;
        log::info!(
            "{}: fetched {} records in {} pages ({} failed, complete: {})",
            partition,
            report.institutions.len(),
            report.pages_requested,
            report.failed_pages,
            report.complete
        );
        report
    }
}

// src/services/query.rs

//! Query engine.
//!
//! Picks the collection a request needs, serving it from the cache when fresh
//! and fetching it otherwise, then paginates locally. Free-text search skips
//! the cache and goes straight to the directory's search endpoint.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::error::{AppError, Result};
use crate::models::{
    Config, CourseCatalog, NormalizedInstitution, PageRequest, PaginationInfo, QueryConfig,
    paginate,
};
use crate::services::normalizer::reference_names;
use crate::services::upstream::{
    DirectorySource, Endpoint, KEYWORD_HEADER, STATE_HEADER, UpstreamClient, header_value,
};
use crate::services::{CollectionFetcher, Normalizer, Partition};
use crate::utils::non_blank;

const STATES_KEY: &str = "states";

/// Shared, immutable view of a cached collection.
pub type Collection = Arc<Vec<NormalizedInstitution>>;

/// Client-supplied filters. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub state: Option<String>,
    pub district: Option<String>,
    pub search: Option<String>,
}

/// What a set of filters resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    Search(String),
    Partition(Partition),
}

/// Where the served items came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Upstream,
    Search,
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub items: Vec<NormalizedInstitution>,
    pub pagination: PaginationInfo,
    pub source: ResultSource,
}

/// Fresh entry counts for both cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cached_collections: usize,
    pub cached_reference_lists: usize,
}

/// Resolves filtered, paginated queries over the directory.
pub struct QueryEngine {
    source: Arc<dyn DirectorySource>,
    normalizer: Arc<Normalizer>,
    fetcher: CollectionFetcher,
    collections: TtlCache<String, Collection>,
    references: TtlCache<String, Arc<Vec<String>>>,
    config: QueryConfig,
}

impl QueryEngine {
    /// Build an engine talking to the configured directory service.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(UpstreamClient::new(&config.upstream)?);
        Self::new(config, source, Arc::new(CourseCatalog::default()))
    }

    /// Build an engine over any directory source, using the system clock.
    pub fn new(
        config: &Config,
        source: Arc<dyn DirectorySource>,
        catalog: Arc<CourseCatalog>,
    ) -> Result<Self> {
        Self::with_clock(config, source, catalog, Arc::new(SystemClock))
    }

    /// Build an engine whose caches read time from `clock`.
    pub fn with_clock(
        config: &Config,
        source: Arc<dyn DirectorySource>,
        catalog: Arc<CourseCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let normalizer = Arc::new(Normalizer::new(catalog)?);
        let fetcher = CollectionFetcher::new(source.clone(), normalizer.clone(), &config.upstream);
        let ttl = config.cache.ttl();

        Ok(Self {
            source,
            normalizer,
            fetcher,
            collections: TtlCache::with_clock(ttl, clock.clone()),
            references: TtlCache::with_clock(ttl, clock),
            config: config.query.clone(),
        })
    }

    /// Decide what a request needs: search first, then district, then state,
    /// then the configured default district.
    pub fn resolve(&self, filters: &QueryFilters) -> QueryTarget {
        if let Some(keyword) = non_blank(filters.search.as_deref()) {
            return QueryTarget::Search(keyword.to_string());
        }
        if let Some(district) = non_blank(filters.district.as_deref()) {
            return QueryTarget::Partition(Partition::District(district.to_string()));
        }
        if let Some(state) = non_blank(filters.state.as_deref()) {
            return QueryTarget::Partition(Partition::State(state.to_string()));
        }
        QueryTarget::Partition(Partition::District(
            self.config.default_district.trim().to_string(),
        ))
    }

    /// Run a query and return the requested page.
    pub async fn query(&self, filters: &QueryFilters, request: PageRequest) -> Result<QueryPage> {
        let (page, limit) = request.clamp(self.config.default_limit, self.config.max_limit);

        let (collection, source) = match self.resolve(filters) {
            QueryTarget::Search(keyword) => {
                (Arc::new(self.search(&keyword).await?), ResultSource::Search)
            }
            QueryTarget::Partition(partition) => {
                header_value(partition.value())?;
                self.collection(&partition).await?
            }
        };

        let (items, pagination) = paginate(collection.as_slice(), page, limit);
        Ok(QueryPage {
            items,
            pagination,
            source,
        })
    }

    /// The full collection for a partition, from cache or freshly fetched.
    ///
    /// Complete fetches are cached. Partial fetches are served but not cached,
    /// so the next request tries again. A fetch that produced nothing because
    /// the directory kept failing is an error, not an empty result.
    pub async fn collection(&self, partition: &Partition) -> Result<(Collection, ResultSource)> {
        let key = partition.cache_key();
        if let Some(collection) = self.collections.get(&key).await {
            log::debug!("{}: cache hit ({} records)", key, collection.len());
            return Ok((collection, ResultSource::Cache));
        }

        let report = self.fetcher.fetch_all(partition).await;
        if report.upstream_unavailable() {
            return Err(AppError::unavailable(format!(
                "no records loaded for {key}; {} of {} pages failed",
                report.failed_pages, report.pages_requested
            )));
        }

        let complete = report.complete;
        let collection = Arc::new(report.institutions);
        if complete {
            self.collections.insert(key, collection.clone()).await;
        } else {
            log::warn!(
                "{}: serving {} records from a partial fetch without caching",
                key,
                collection.len()
            );
        }

        Ok((collection, ResultSource::Upstream))
    }

    /// Live keyword search. A single upstream call; results are never cached.
    pub async fn search(&self, keyword: &str) -> Result<Vec<NormalizedInstitution>> {
        header_value(keyword)?;
        let headers = [(KEYWORD_HEADER, keyword.to_string())];
        let page = self.source.fetch_page(Endpoint::Search, &headers).await?;

        let results: Vec<_> = page
            .iter()
            .filter_map(|entry| self.normalizer.normalize(entry))
            .collect();
        log::info!("search {:?}: {} results", keyword, results.len());
        Ok(results)
    }

    /// All state names known to the directory.
    pub async fn states(&self) -> Result<Arc<Vec<String>>> {
        self.reference_list(STATES_KEY.to_string(), Endpoint::AllStates, &[])
            .await
    }

    /// District names within a state.
    pub async fn districts(&self, state: &str) -> Result<Arc<Vec<String>>> {
        let state = state.trim();
        if state.is_empty() {
            return Ok(Arc::new(Vec::new()));
        }
        header_value(state)?;
        let headers = [(STATE_HEADER, state.to_string())];
        self.reference_list(format!("districts:{state}"), Endpoint::Districts, &headers)
            .await
    }

    /// Prefetch several partitions into the cache, at most `concurrency` at a
    /// time. Each partition is still fetched page by page. Returns how many
    /// partitions loaded.
    pub async fn warm(&self, partitions: Vec<Partition>, concurrency: usize) -> usize {
        let total = partitions.len();
        let mut loaded = 0;
        let mut results = stream::iter(partitions)
            .map(|partition| async move {
                let result = self.collection(&partition).await;
                (partition, result)
            })
            .buffer_unordered(concurrency.max(1));

        while let Some((partition, result)) = results.next().await {
            match result {
                Ok((collection, _)) => {
                    loaded += 1;
                    log::info!("Warmed {} ({} records)", partition, collection.len());
                }
                Err(e) => log::warn!("Failed to warm {}: {}", partition, e),
            }
        }

        log::info!("Cache warm-up finished: {}/{} partitions loaded", loaded, total);
        loaded
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cached_collections: self.collections.len().await,
            cached_reference_lists: self.references.len().await,
        }
    }

    /// Drop expired entries from both namespaces.
    pub async fn purge_expired(&self) -> usize {
        self.collections.purge_expired().await + self.references.purge_expired().await
    }

    async fn reference_list(
        &self,
        key: String,
        endpoint: Endpoint,
        headers: &[(&'static str, String)],
    ) -> Result<Arc<Vec<String>>> {
        if let Some(list) = self.references.get(&key).await {
            return Ok(list);
        }

        let page = self
            .source
            .fetch_page(endpoint, headers)
            .await
            .map_err(|e| AppError::unavailable(format!("{key}: {e}")))?;
        let names = Arc::new(reference_names(&page));

        // An empty list is not pinned for a whole TTL.
        if !names.is_empty() {
            self.references.insert(key, names.clone()).await;
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::ManualClock;
    use crate::services::upstream::{Headers, RawPage};

    /// In-memory directory keyed by endpoint and header values.
    #[derive(Default)]
    struct FakeDirectory {
        partitions: HashMap<String, Vec<Value>>,
        searches: HashMap<String, Vec<Value>>,
        states: Vec<Value>,
        districts: HashMap<String, Vec<Value>>,
        down: AtomicBool,
        failing_offsets: Vec<usize>,
        calls: Mutex<Vec<(Endpoint, Vec<(String, String)>)>>,
    }

    impl FakeDirectory {
        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn calls_to(&self, endpoint: Endpoint) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(e, _)| *e == endpoint)
                .count()
        }
    }

    fn header<'a>(headers: &'a Headers, name: &str) -> &'a str {
        headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    #[async_trait]
    impl DirectorySource for FakeDirectory {
        async fn fetch_page(&self, endpoint: Endpoint, headers: &Headers) -> Result<RawPage> {
            self.calls.lock().unwrap().push((
                endpoint,
                headers.iter().map(|(n, v)| (n.to_string(), v.clone())).collect(),
            ));
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::upstream(endpoint.path(), 3, "down"));
            }

            let page = match endpoint {
                Endpoint::AllStates => self.states.clone(),
                Endpoint::Districts => self
                    .districts
                    .get(header(headers, "State"))
                    .cloned()
                    .unwrap_or_default(),
                Endpoint::Search => self
                    .searches
                    .get(header(headers, "Keyword"))
                    .cloned()
                    .unwrap_or_default(),
                Endpoint::CollegesByState | Endpoint::CollegesByDistrict => {
                    let name = if endpoint == Endpoint::CollegesByState {
                        format!("state:{}", header(headers, "State"))
                    } else {
                        format!("district:{}", header(headers, "District"))
                    };
                    let offset: usize = header(headers, "Offset").parse().unwrap();
                    if self.failing_offsets.contains(&offset) {
                        return Err(AppError::upstream(endpoint.path(), 3, "flaky page"));
                    }
                    let all = self.partitions.get(&name).cloned().unwrap_or_default();
                    let mut page: Vec<Value> = all.into_iter().skip(offset).take(10).collect();
                    if !page.is_empty() {
                        page.resize(10, Value::Null);
                    }
                    page
                }
            };
            Ok(page)
        }
    }

    fn colleges(district: &str, count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                json!([
                    format!("{district}-{i}"),
                    "Uni",
                    format!("College {i}"),
                    "",
                    "Maharashtra",
                    district
                ])
            })
            .collect()
    }

    fn engine(directory: Arc<FakeDirectory>) -> (QueryEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = QueryEngine::with_clock(
            &Config::default(),
            directory,
            Arc::new(CourseCatalog::default()),
            clock.clone(),
        )
        .unwrap();
        (engine, clock)
    }

    fn filters(state: Option<&str>, district: Option<&str>, search: Option<&str>) -> QueryFilters {
        QueryFilters {
            state: state.map(String::from),
            district: district.map(String::from),
            search: search.map(String::from),
        }
    }

    #[test]
    fn test_resolve_priority() {
        let (engine, _) = engine(Arc::new(FakeDirectory::default()));

        assert_eq!(
            engine.resolve(&filters(Some("Goa"), Some("Pune"), Some("iit"))),
            QueryTarget::Search("iit".into())
        );
        assert_eq!(
            engine.resolve(&filters(Some("Goa"), Some("Pune"), Some("  "))),
            QueryTarget::Partition(Partition::District("Pune".into()))
        );
        assert_eq!(
            engine.resolve(&filters(Some("Goa"), None, None)),
            QueryTarget::Partition(Partition::State("Goa".into()))
        );
        assert_eq!(
            engine.resolve(&QueryFilters::default()),
            QueryTarget::Partition(Partition::District("Pune".into()))
        );
    }

    #[tokio::test]
    async fn test_district_query_paginates_and_caches() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([("district:Nagpur".to_string(), colleges("Nagpur", 23))]),
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());
        let f = filters(None, Some("Nagpur"), None);

        let first = engine.query(&f, PageRequest::new(Some(3), Some(10))).await.unwrap();
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.pagination.total_items, 23);
        assert_eq!(first.pagination.total_pages, 3);
        assert_eq!(first.source, ResultSource::Upstream);
        let calls_after_first = directory.calls();
        assert_eq!(calls_after_first, 3);

        let second = engine.query(&f, PageRequest::new(Some(1), Some(50))).await.unwrap();
        assert_eq!(second.items.len(), 23);
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(directory.calls(), calls_after_first);
    }

    #[tokio::test]
    async fn test_stale_collection_is_refetched() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([("state:Goa".to_string(), colleges("Panaji", 4))]),
            ..FakeDirectory::default()
        });
        let (engine, clock) = engine(directory.clone());
        let f = filters(Some("Goa"), None, None);

        engine.query(&f, PageRequest::default()).await.unwrap();
        clock.advance(TimeDelta::minutes(59));
        let hit = engine.query(&f, PageRequest::default()).await.unwrap();
        assert_eq!(hit.source, ResultSource::Cache);
        assert_eq!(directory.calls_to(Endpoint::CollegesByState), 1);

        clock.advance(TimeDelta::minutes(2));
        let refreshed = engine.query(&f, PageRequest::default()).await.unwrap();
        assert_eq!(refreshed.source, ResultSource::Upstream);
        assert_eq!(directory.calls_to(Endpoint::CollegesByState), 2);
    }

    #[tokio::test]
    async fn test_no_filters_uses_default_district() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([("district:Pune".to_string(), colleges("Pune", 2))]),
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());

        let page = engine
            .query(&QueryFilters::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(directory.calls_to(Endpoint::CollegesByDistrict), 1);
    }

    #[tokio::test]
    async fn test_search_bypasses_cache() {
        let directory = Arc::new(FakeDirectory {
            searches: HashMap::from([(
                "medical".to_string(),
                vec![
                    json!([
                        1,
                        "AIIMS",
                        "All India Institute of Medical Sciences",
                        "Government",
                        "Delhi",
                        "New Delhi"
                    ]),
                    Value::Null,
                ],
            )]),
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());
        let f = filters(Some("Goa"), None, Some("medical"));

        for _ in 0..2 {
            let page = engine.query(&f, PageRequest::default()).await.unwrap();
            assert_eq!(page.source, ResultSource::Search);
            assert_eq!(page.items.len(), 1);
            assert_eq!(page.items[0].id, "ext_1");
        }
        assert_eq!(directory.calls_to(Endpoint::Search), 2);
        assert_eq!(directory.calls_to(Endpoint::CollegesByState), 0);
    }

    #[tokio::test]
    async fn test_cold_key_with_upstream_down_is_error() {
        let directory = Arc::new(FakeDirectory::default());
        directory.down.store(true, Ordering::SeqCst);
        let (engine, _) = engine(directory.clone());

        let err = engine
            .query(&filters(None, Some("Pune"), None), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(engine.cache_stats().await.cached_collections, 0);
    }

    #[tokio::test]
    async fn test_partial_fetch_is_served_but_not_cached() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([("district:Pune".to_string(), colleges("Pune", 25))]),
            failing_offsets: vec![10],
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());
        let f = filters(None, Some("Pune"), None);

        let page = engine.query(&f, PageRequest::new(None, Some(50))).await.unwrap();
        assert_eq!(page.pagination.total_items, 15);
        assert_eq!(page.source, ResultSource::Upstream);
        assert_eq!(engine.cache_stats().await.cached_collections, 0);

        let again = engine.query(&f, PageRequest::default()).await.unwrap();
        assert_eq!(again.source, ResultSource::Upstream);
    }

    #[tokio::test]
    async fn test_genuinely_empty_partition_is_ok() {
        let (engine, _) = engine(Arc::new(FakeDirectory::default()));

        let page = engine
            .query(&filters(None, Some("Nowhere"), None), PageRequest::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total_pages, 1);
        assert_eq!(engine.cache_stats().await.cached_collections, 1);
    }

    #[tokio::test]
    async fn test_search_failure_is_error() {
        let directory = Arc::new(FakeDirectory::default());
        directory.down.store(true, Ordering::SeqCst);
        let (engine, _) = engine(directory);

        let err = engine
            .query(&filters(None, None, Some("law")), PageRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_warm_fills_cache() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([
                ("district:Pune".to_string(), colleges("Pune", 12)),
                ("state:Goa".to_string(), colleges("Panaji", 3)),
            ]),
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());

        let loaded = engine
            .warm(
                vec![Partition::District("Pune".into()), Partition::State("Goa".into())],
                4,
            )
            .await;
        assert_eq!(loaded, 2);
        assert_eq!(engine.cache_stats().await.cached_collections, 2);

        let calls = directory.calls();
        let page = engine
            .query(&QueryFilters::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.source, ResultSource::Cache);
        assert_eq!(directory.calls(), calls);
    }

    #[tokio::test]
    async fn test_reference_lists_are_cached() {
        let directory = Arc::new(FakeDirectory {
            states: vec![json!("Goa"), json!("Kerala"), Value::Null],
            districts: HashMap::from([(
                "Kerala".to_string(),
                vec![json!("Kochi"), json!("Thrissur")],
            )]),
            ..FakeDirectory::default()
        });
        let (engine, _) = engine(directory.clone());

        assert_eq!(*engine.states().await.unwrap(), vec!["Goa", "Kerala"]);
        assert_eq!(*engine.states().await.unwrap(), vec!["Goa", "Kerala"]);
        assert_eq!(directory.calls_to(Endpoint::AllStates), 1);

        assert_eq!(*engine.districts("Kerala").await.unwrap(), vec!["Kochi", "Thrissur"]);
        assert!(engine.districts("Atlantis").await.unwrap().is_empty());
        assert!(engine.districts("Atlantis").await.unwrap().is_empty());
        assert_eq!(directory.calls_to(Endpoint::Districts), 3);

        let stats = engine.cache_stats().await;
        assert_eq!(stats.cached_reference_lists, 2);
    }

    #[tokio::test]
    async fn test_reference_list_failure_is_unavailable() {
        let directory = Arc::new(FakeDirectory::default());
        directory.down.store(true, Ordering::SeqCst);
        let (engine, _) = engine(directory);

        assert!(matches!(engine.states().await, Err(AppError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unsendable_filter_values_are_rejected_without_upstream_calls() {
        let directory = Arc::new(FakeDirectory::default());
        let (engine, _) = engine(directory.clone());

        for f in [
            filters(None, None, Some("iit\ndelhi")),
            filters(None, Some("Pu\rne"), None),
            filters(Some("Go\na"), None, None),
        ] {
            let err = engine.query(&f, PageRequest::default()).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{err}");
            assert!(!err.is_upstream());
        }
        assert!(matches!(engine.districts("Ker\nala").await, Err(AppError::Validation(_))));
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_drops_stale_entries_from_stats() {
        let directory = Arc::new(FakeDirectory {
            partitions: HashMap::from([("district:Pune".to_string(), colleges("Pune", 4))]),
            states: vec![json!("Goa")],
            ..FakeDirectory::default()
        });
        let (engine, clock) = engine(directory);

        engine
            .query(&QueryFilters::default(), PageRequest::default())
            .await
            .unwrap();
        engine.states().await.unwrap();
        assert_eq!(
            engine.cache_stats().await,
            CacheStats {
                cached_collections: 1,
                cached_reference_lists: 1,
            }
        );

        clock.advance(TimeDelta::hours(2));
        assert_eq!(engine.purge_expired().await, 2);
        assert_eq!(engine.purge_expired().await, 0);
        assert_eq!(engine.cache_stats().await.cached_collections, 0);
    }
}

//! Service layer for the directory proxy.
//!
//! This module contains the business logic for:
//! - Talking to the directory API with retry (`UpstreamClient`)
//! - Walking every page of a partition (`CollectionFetcher`)
//! - Turning positional records into institutions (`Normalizer`)
//! - Answering filtered, paginated queries (`QueryEngine`)

mod fetcher;
mod normalizer;
mod query;
pub mod upstream;

pub use fetcher::{CollectionFetcher, FetchReport, Partition};
pub use normalizer::{Normalizer, reference_names};
pub use query::{
    CacheStats, Collection, QueryEngine, QueryFilters, QueryPage, QueryTarget, ResultSource,
};
pub use upstream::{DirectorySource, Endpoint, RawPage, UpstreamClient};

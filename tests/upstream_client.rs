//! Upstream client behavior against a local directory server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use college_proxy::error::AppError;
use college_proxy::models::{Config, CourseCatalog, PageRequest, UpstreamConfig};
use college_proxy::services::{
    DirectorySource, Endpoint, QueryEngine, QueryFilters, ResultSource, UpstreamClient,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Directory that fails the first `fail_first` calls, then serves `total`
/// records for any district in pages of ten padded with nulls.
struct FlakyDirectory {
    hits: AtomicUsize,
    fail_first: usize,
    total: usize,
}

impl FlakyDirectory {
    fn new(fail_first: usize, total: usize) -> Arc<Self> {
        Arc::new(Self {
            hits: AtomicUsize::new(0),
            fail_first,
            total,
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn colleges_by_district(
    State(directory): State<Arc<FlakyDirectory>>,
    headers: HeaderMap,
) -> Response {
    let hit = directory.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= directory.fail_first {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let district = headers
        .get("District")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let offset: usize = headers
        .get("Offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut page: Vec<Value> = (offset..directory.total.min(offset + 10))
        .map(|i| {
            json!([
                i,
                "University of Mumbai",
                format!("College {i}"),
                "Private",
                "Maharashtra",
                district
            ])
        })
        .collect();
    if !page.is_empty() {
        page.resize(10, Value::Null);
    }
    Json(page).into_response()
}

async fn not_an_array() -> Json<Value> {
    Json(json!({ "error": "maintenance" }))
}

async fn spawn_directory(directory: Arc<FlakyDirectory>) -> String {
    let app = Router::new()
        .route("/colleges/district", post(colleges_by_district))
        .route("/colleges/search", post(not_an_array))
        .with_state(directory);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

fn upstream_config(base_url: String) -> UpstreamConfig {
    UpstreamConfig {
        base_url,
        timeout_secs: 5,
        retry_backoff_ms: 10,
        ..UpstreamConfig::default()
    }
}

fn district_headers(district: &str, offset: usize) -> Vec<(&'static str, String)> {
    vec![("District", district.to_string()), ("Offset", offset.to_string())]
}

#[tokio::test]
async fn test_gives_up_after_three_attempts() {
    let directory = FlakyDirectory::new(usize::MAX, 0);
    let base_url = spawn_directory(directory.clone()).await;
    let client = UpstreamClient::new(&upstream_config(base_url)).unwrap();

    let result = client
        .fetch_page(Endpoint::CollegesByDistrict, &district_headers("Pune", 0))
        .await;

    match result {
        Err(AppError::Upstream { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected upstream failure, got {other:?}"),
    }
    assert_eq!(directory.hits(), 3);
}

#[tokio::test]
async fn test_recovers_on_third_attempt() {
    let directory = FlakyDirectory::new(2, 4);
    let base_url = spawn_directory(directory.clone()).await;
    let client = UpstreamClient::new(&upstream_config(base_url)).unwrap();

    let page = client
        .fetch_page(Endpoint::CollegesByDistrict, &district_headers("Thane", 0))
        .await
        .unwrap();

    assert_eq!(directory.hits(), 3);
    assert_eq!(page.len(), 10);
    assert_eq!(page[0][5], "Thane");
    assert!(page[4].is_null());
}

#[tokio::test]
async fn test_non_array_body_is_a_failure() {
    let directory = FlakyDirectory::new(0, 0);
    let base_url = spawn_directory(directory).await;
    let client = UpstreamClient::new(&upstream_config(base_url)).unwrap();

    let result = client
        .fetch_page(Endpoint::Search, &[("Keyword", "iit".to_string())])
        .await;

    assert!(matches!(result, Err(AppError::Upstream { .. })));
}

#[tokio::test]
async fn test_invalid_header_value_fails_fast_without_request() {
    let directory = FlakyDirectory::new(0, 10);
    let base_url = spawn_directory(directory.clone()).await;
    let client = UpstreamClient::new(&upstream_config(base_url)).unwrap();

    let result = client
        .fetch_page(Endpoint::CollegesByDistrict, &district_headers("Pu\nne", 0))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(directory.hits(), 0);
}

#[tokio::test]
async fn test_engine_walks_real_pages() {
    let directory = FlakyDirectory::new(0, 37);
    let base_url = spawn_directory(directory.clone()).await;
    let config = Config {
        upstream: upstream_config(base_url),
        ..Config::default()
    };
    let source = Arc::new(UpstreamClient::new(&config.upstream).unwrap());
    let engine = QueryEngine::new(&config, source, Arc::new(CourseCatalog::default())).unwrap();

    let filters = QueryFilters {
        district: Some("Mumbai".to_string()),
        ..QueryFilters::default()
    };
    let page = engine
        .query(&filters, PageRequest::new(Some(2), Some(20)))
        .await
        .unwrap();

    assert_eq!(page.pagination.total_items, 37);
    assert_eq!(page.items.len(), 17);
    assert_eq!(page.items[0].id, "ext_20");
    assert_eq!(page.source, ResultSource::Upstream);
    // Offsets 0, 10, 20, 30; the partial page at 30 ends the walk.
    assert_eq!(directory.hits(), 4);
}

// src/server/routes.rs

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{NormalizedInstitution, PageRequest, PaginationInfo};
use crate::server::AppState;
use crate::services::{QueryFilters, ResultSource};

/// Query string of the colleges listing.
///
/// `page` and `limit` stay raw strings so junk values fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct CollegeParams {
    pub state: Option<String>,
    pub district: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollegesResponse {
    pub success: bool,
    pub colleges: Vec<NormalizedInstitution>,
    pub pagination: PaginationInfo,
    pub source: ResultSource,
}

#[derive(Debug, Serialize)]
pub struct StatesResponse {
    pub success: bool,
    pub states: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DistrictsResponse {
    pub success: bool,
    pub districts: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub cached_collections: usize,
    pub cached_reference_lists: usize,
}

pub async fn colleges_handler(
    State(state): State<AppState>,
    Query(params): Query<CollegeParams>,
) -> Result<Json<CollegesResponse>> {
    let filters = QueryFilters {
        state: params.state,
        district: params.district,
        search: params.search,
    };
    let request = PageRequest::parse(params.page.as_deref(), params.limit.as_deref());

    let page = state.engine.query(&filters, request).await?;

    Ok(Json(CollegesResponse {
        success: true,
        colleges: page.items,
        pagination: page.pagination,
        source: page.source,
    }))
}

pub async fn states_handler(State(state): State<AppState>) -> Result<Json<StatesResponse>> {
    let states = state.engine.states().await?;
    Ok(Json(StatesResponse {
        success: true,
        states: states.to_vec(),
    }))
}

pub async fn districts_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DistrictsResponse>> {
    let districts = state.engine.districts(&name).await?;
    Ok(Json(DistrictsResponse {
        success: true,
        districts: districts.to_vec(),
    }))
}

/// Liveness plus cache occupancy.
///
/// Expired entries are purged first, so the counts only cover fresh data.
/// This is the only place expired entries are swept.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let purged = state.engine.purge_expired().await;
    if purged > 0 {
        log::debug!("Purged {} expired cache entries", purged);
    }
    let stats = state.engine.cache_stats().await;

    Json(HealthResponse {
        success: true,
        status: "ok",
        cached_collections: stats.cached_collections,
        cached_reference_lists: stats.cached_reference_lists,
    })
}

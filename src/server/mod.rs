// src/server/mod.rs

//! HTTP façade.
//!
//! - `GET /api/external-colleges?state=&district=&search=&page=&limit=`
//! - `GET /api/external-colleges/filters/states`
//! - `GET /api/external-colleges/filters/districts/{state}`
//! - `GET /health`

mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;
use crate::models::ServerConfig;
use crate::services::QueryEngine;

pub use routes::{
    CollegeParams, CollegesResponse, DistrictsResponse, HealthResponse, StatesResponse,
};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}

impl AppState {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }
}

/// Build the router with CORS for browser clients.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/external-colleges", get(routes::colleges_handler))
        .route(
            "/api/external-colleges/filters/states",
            get(routes::states_handler),
        )
        .route(
            "/api/external-colleges/filters/districts/{state}",
            get(routes::districts_handler),
        )
        .route("/health", get(routes::health_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServerConfig, engine: Arc<QueryEngine>) -> Result<()> {
    let app = router(AppState::new(engine));

    let address = config.address();
    log::info!("Binding to {}", address);
    let listener = TcpListener::bind(&address).await?;
    log::info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// src/error.rs

//! Unified error handling for the directory proxy.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Message shown to clients when the directory service cannot be reached.
pub const UNAVAILABLE_MESSAGE: &str =
    "Failed to load colleges from the directory service, please retry";

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A single upstream request failed after exhausting its retries
    #[error("Upstream {endpoint} failed after {attempts} attempts: {message}")]
    Upstream {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// No data could be loaded at all for a collection or reference list
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an upstream failure for an endpoint.
    pub fn upstream(
        endpoint: impl Into<String>,
        attempts: u32,
        message: impl fmt::Display,
    ) -> Self {
        Self::Upstream {
            endpoint: endpoint.into(),
            attempts,
            message: message.to_string(),
        }
    }

    /// Create an unavailability error with context.
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(context.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error means the directory service could not be reached.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::UpstreamUnavailable(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_upstream() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_upstream() {
            log::warn!("Serving upstream failure: {}", self);
            UNAVAILABLE_MESSAGE.to_string()
        } else if status.is_client_error() {
            log::warn!("Rejected request: {}", self);
            self.to_string()
        } else {
            log::error!("Request failed: {}", self);
            self.to_string()
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

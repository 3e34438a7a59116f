// src/utils/http.rs

//! HTTP client utilities.

use reqwest::Client;

use crate::error::Result;
use crate::models::UpstreamConfig;

/// Create an HTTP client configured for the directory service.
///
/// The per-request timeout is set on the client so every upstream call,
/// including retries, is bounded by it.
pub fn create_async_client(config: &UpstreamConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

// src/services/upstream.rs

//! Directory API client.
//!
//! Every upstream call is a `POST` with its parameters carried in request
//! headers. Each call is retried with linear backoff. When retries run out the
//! caller gets an [`AppError::Upstream`], never an empty page, so "the
//! directory errored" stays distinguishable from "no more data". Parameters
//! that cannot travel as header values are rejected up front as
//! [`AppError::Validation`] and never retried.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderValue;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::UpstreamConfig;
use crate::utils::{endpoint_url, http};

/// A decoded upstream response: records, possibly padded with `null`.
pub type RawPage = Vec<Value>;

/// Request headers as `(name, value)` pairs.
pub type Headers = [(&'static str, String)];

pub const STATE_HEADER: &str = "State";
pub const DISTRICT_HEADER: &str = "District";
pub const OFFSET_HEADER: &str = "Offset";
pub const KEYWORD_HEADER: &str = "Keyword";

/// Check that a parameter can be sent as a header value.
///
/// Control characters such as newlines are rejected. Non-ASCII text passes.
pub fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::validation(format!("{value:?} is not a valid directory parameter")))
}

/// Logical upstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AllStates,
    Districts,
    CollegesByState,
    CollegesByDistrict,
    Search,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::AllStates => "/allstates",
            Endpoint::Districts => "/districts",
            Endpoint::CollegesByState => "/colleges/state",
            Endpoint::CollegesByDistrict => "/colleges/district",
            Endpoint::Search => "/colleges/search",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Anything that can serve raw directory pages.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch one page from `endpoint`.
    ///
    /// Returns the raw page on success (which may be empty or null-padded),
    /// or an error once the source has given up on the request.
    async fn fetch_page(&self, endpoint: Endpoint, headers: &Headers) -> Result<RawPage>;
}

/// HTTP client for the directory service with bounded retry.
pub struct UpstreamClient {
    client: Client,
    base: Url,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a client from upstream settings.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            base: config.base()?,
            config: config.clone(),
        })
    }

    /// Issue a single request without retry.
    async fn request_once(
        &self,
        url: &Url,
        headers: &[(&'static str, HeaderValue)],
    ) -> Result<RawPage> {
        let mut request = self.client.post(url.clone());
        for (name, value) in headers {
            request = request.header(*name, value.clone());
        }

        let response = request.send().await?.error_for_status()?;
        let page: RawPage = response.json().await?;
        Ok(page)
    }
}

#[async_trait]
impl DirectorySource for UpstreamClient {
    async fn fetch_page(&self, endpoint: Endpoint, headers: &Headers) -> Result<RawPage> {
        let url = endpoint_url(&self.base, endpoint.path())?;
        let values = headers
            .iter()
            .map(|(name, value)| Ok((*name, header_value(value)?)))
            .collect::<Result<Vec<_>>>()?;
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.request_once(&url, &values).await {
                Ok(page) => {
                    log::debug!(
                        "{} {:?} returned {} entries (attempt {})",
                        endpoint,
                        headers,
                        page.len(),
                        attempt
                    );
                    return Ok(page);
                }
                Err(e) => {
                    log::warn!(
                        "{} {:?} attempt {}/{} failed: {}",
                        endpoint,
                        headers,
                        attempt,
                        attempts,
                        e
                    );
                    last_error = e.to_string();

                    if attempt < attempts {
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        log::error!("{} {:?} gave up after {} attempts", endpoint, headers, attempts);
        Err(AppError::upstream(endpoint.path(), attempts, last_error))
    }
}

//! Catalog client for the skin listing API.
//!
//! The catalog exposes paginated listings at `{base}/get/list/{page}`,
//! each returning a JSON object `{ "skins": [...] }`. The client issues
//! one GET per page with explicit timeouts and decodes the descriptor
//! records; everything past that (dedup, download, persistence) is the
//! pipeline's job.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, trace};

use crate::USER_AGENT;

/// Production catalog base URL.
pub const DEFAULT_CATALOG_BASE: &str = "https://api.mineskin.org";

/// Connect timeout for catalog requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total per-request timeout for catalog requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from catalog page fetches.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error (DNS, connection refused, TLS, ...).
    #[error("network error fetching catalog page {url}: {source}")]
    Network {
        /// The page URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching catalog page {url}")]
    Timeout {
        /// The page URL that timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} fetching catalog page {url}")]
    HttpStatus {
        /// The page URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not a valid skin listing.
    #[error("failed to decode catalog page {url}: {source}")]
    Decode {
        /// The page URL with the malformed body.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

/// One skin record as returned by the catalog listing.
///
/// Immutable once received; only `url` (and `id` for the metadata row)
/// are load-bearing for the pipeline, the rest is provenance.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SkinDescriptor {
    /// Catalog skin id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Skin UUID.
    #[serde(default, rename = "skinUuid")]
    pub skin_uuid: Option<String>,
    /// Owner UUID.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Texture URL; the artifact key is derived from it.
    pub url: String,
    /// Catalog timestamp (epoch seconds).
    #[serde(default)]
    pub time: f64,
    /// Skin model variant (`classic`/`slim`).
    #[serde(default, alias = "model")]
    pub variant: Option<String>,
}

/// Wire shape of a catalog listing page.
#[derive(Debug, Deserialize)]
struct SkinPage {
    #[serde(default)]
    skins: Vec<SkinDescriptor>,
}

/// HTTP client for paginated catalog reads.
///
/// Created once and reused; requests share a connection pool.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Creates a catalog client for the given base URL.
    ///
    /// A trailing slash on `base_url` is tolerated.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Fetches one listing page and returns its descriptors.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] on network failure, timeout, HTTP
    /// error status, or a malformed body.
    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn page(&self, index: u32) -> Result<Vec<SkinDescriptor>, CatalogError> {
        let url = format!("{}/get/list/{index}", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|source| {
            if source.is_timeout() {
                CatalogError::Timeout { url: url.clone() }
            } else {
                CatalogError::Network {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let page: SkinPage = response.json().await.map_err(|source| {
            if source.is_timeout() {
                CatalogError::Timeout { url: url.clone() }
            } else {
                CatalogError::Decode {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        trace!(index, count = page.skins.len(), "catalog page decoded");
        Ok(page.skins)
    }
}

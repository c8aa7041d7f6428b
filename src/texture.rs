//! HTTP client for fetching texture payloads.
//!
//! Fetches the raw bytes behind a descriptor's texture URL. Skins are a
//! few kilobytes, so bodies are buffered in memory and handed to the
//! content store whole; nothing touches disk until the fetch succeeded.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::{instrument, trace};

use crate::USER_AGENT;

/// Connect timeout for texture requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total per-request timeout for texture requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from texture fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection refused, TLS, ...).
    #[error("network error fetching texture {url}: {source}")]
    Network {
        /// The texture URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching texture {url}")]
    Timeout {
        /// The texture URL that timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} fetching texture {url}")]
    HttpStatus {
        /// The texture URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

/// HTTP client for downloading texture payloads.
///
/// Created once and shared by all batch workers; requests share a
/// connection pool.
#[derive(Debug, Clone)]
pub struct TextureClient {
    client: reqwest::Client,
}

impl Default for TextureClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureClient {
    /// Creates a texture client with the default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches the raw bytes at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on network failure, timeout, or an HTTP
    /// error status.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let map_err = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(map_err)?;
        trace!(len = bytes.len(), "texture fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_http_status_display() {
        let error = FetchError::HttpStatus {
            url: "https://textures.minecraft.net/texture/abc".to_string(),
            status: 404,
        };
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("texture/abc"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_fetch_error_timeout_display() {
        let error = FetchError::Timeout {
            url: "https://textures.minecraft.net/texture/abc".to_string(),
        };
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_client_is_cloneable() {
        let client = TextureClient::new();
        let _clone = client.clone();
    }
}

//! Band raster retrieval.
//!
//! The coordinator fetches whole band rasters over HTTP(S). The trait seam
//! exists so tests (and any future object-store source) can supply bytes
//! without a network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use nbr_common::{NbrError, NbrResult};
use reqwest::Client;
use tracing::debug;

/// Source of raw band raster bytes, keyed by URL.
#[async_trait]
pub trait BandFetcher: Send + Sync {
    /// Retrieve the complete raster at `url`.
    async fn fetch(&self, url: &str) -> NbrResult<Bytes>;
}

/// HTTP(S) fetcher backed by a shared reqwest client.
pub struct HttpBandFetcher {
    client: Client,
}

impl HttpBandFetcher {
    /// Build a fetcher with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> NbrResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| NbrError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl BandFetcher for HttpBandFetcher {
    async fn fetch(&self, url: &str) -> NbrResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NbrError::InputFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NbrError::InputFetch {
                url: url.to_string(),
                message: format!("HTTP status {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| NbrError::InputFetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(url, bytes = bytes.len(), "fetched band raster");
        Ok(bytes)
    }
}

//! Network Fetcher Module
//!
//! The controller's only way out to the network.

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::cache::{AssetRequest, CachedResponse};
use crate::error::{InventoryError, Result};

/// Performs a network request on behalf of the cache controller.
///
/// Transport failures are reported as `InventoryError::Network`; an HTTP
/// error status is still a successful fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse>;
}

// == HTTP Fetcher ==
/// `Fetcher` backed by a reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| InventoryError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InventoryError::Network(format!("{}: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| InventoryError::Network(format!("{}: {}", request.url, e)))?
            .to_vec();

        debug!("Fetched {} {} -> {}", request.method, request.url, status);
        Ok(CachedResponse::new(status, headers, body))
    }
}

//! HTTP client for the Virtual Radar Server aircraft-list endpoint.

use crate::vrs::VrsDocument;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned error status: {status}")]
    ServerError { status: StatusCode },
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
}

/// Configuration for the VRS client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Virtual Radar Server, e.g. `http://host:8080/VirtualRadar`.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for fetching the aircraft list.
pub struct VrsClient {
    client: Client,
    base_url: String,
}

impl VrsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Fetch one aircraft-list document. Passing the previous document's
    /// version token lets the server compute deltas server-side; the
    /// response still carries the full list plus the new token.
    pub async fn fetch(&self, last_dv: Option<&str>) -> Result<VrsDocument, ClientError> {
        let mut url = format!("{}/AircraftList.json", self.base_url);
        if let Some(dv) = last_dv {
            url.push_str(&format!("?lastDv={dv}"));
        }

        tracing::debug!(%url, "fetching aircraft list");

        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<VrsDocument>().await?),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ClientError::RateLimited { retry_after })
            }
            status => Err(ClientError::ServerError { status }),
        }
    }
}

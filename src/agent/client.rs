//! HTTP client for deployed telemetry agents.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::protocol::{HealthResponse, MetricsResponse, ProcessesResponse};

/// Port agents listen on unless told otherwise.
pub const DEFAULT_AGENT_PORT: u16 = 9876;

/// Ceiling on any single agent request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to build HTTP client: {0}")]
    Init(reqwest::Error),

    #[error("agent at {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        source: reqwest::Error,
    },

    #[error("agent returned HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("agent response could not be decoded: {0}")]
    Decode(reqwest::Error),
}

/// Typed client for one agent endpoint.
pub struct AgentClient {
    http: reqwest::Client,
    base: String,
}

impl AgentClient {
    pub fn new(host: &str, port: u16) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AgentError::Init)?;
        Ok(Self {
            http,
            base: format!("http://{}:{}", host, port),
        })
    }

    pub async fn health(&self) -> Result<HealthResponse, AgentError> {
        self.get_json("/health").await
    }

    pub async fn metrics(&self) -> Result<MetricsResponse, AgentError> {
        self.get_json("/metrics").await
    }

    pub async fn processes(&self) -> Result<ProcessesResponse, AgentError> {
        self.get_json("/processes").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let url = format!("{}{}", self.base, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| AgentError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status { url, status });
        }
        response.json().await.map_err(AgentError::Decode)
    }
}

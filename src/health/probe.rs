//! Health probes.
//!
//! # Responsibilities
//! - Issue one request against the backend's health endpoint
//! - Classify the outcome as healthy or a typed failure
//!
//! # Design Decisions
//! - Only HTTP 200 is healthy; any other status is a failure
//! - The response body is never inspected
//! - Deadlines are enforced by the monitor, not the probe

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Why a probe did not count as healthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Connection refused, DNS failure, reset, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// The probe exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with something other than 200.
    #[error("unhealthy status {0}")]
    Status(u16),
}

impl ProbeError {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Transport(_) => "transport",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Status(_) => "status",
        }
    }
}

/// A single health check against some backend.
pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Probes an HTTP health endpoint with `GET`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpProbe {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl HealthProbe for HttpProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("backend-status/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Status(status.as_u16())),
        }
    }
}

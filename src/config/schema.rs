//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::health::policy::MonitorPolicy;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Availability monitor settings.
    pub monitor: MonitorConfig,

    /// Status endpoint settings.
    pub status: StatusServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Availability monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Backend base URL (e.g., "http://127.0.0.1:8080").
    pub base_url: String,

    /// Health endpoint path, outside any API prefix.
    pub health_path: String,

    /// Consecutive failed probes before the backend is declared offline.
    pub failure_threshold: u32,

    /// Probe interval in seconds while online.
    pub healthy_interval_secs: u64,

    /// First backoff delay in seconds once probes fail.
    pub unhealthy_base_interval_secs: u64,

    /// Backoff ceiling in seconds.
    pub unhealthy_max_interval_secs: u64,

    /// Cap on the exponential backoff multiplier.
    pub backoff_multiplier_cap: u32,

    /// Per-probe deadline in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            health_path: "/actuator/health".to_string(),
            failure_threshold: 2,
            healthy_interval_secs: 30,
            unhealthy_base_interval_secs: 30,
            unhealthy_max_interval_secs: 300,
            backoff_multiplier_cap: 10,
            probe_timeout_ms: 5000,
        }
    }
}

impl MonitorConfig {
    /// Full URL of the health endpoint.
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(&self.health_path)
    }

    pub fn policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            failure_threshold: self.failure_threshold,
            healthy_interval: Duration::from_secs(self.healthy_interval_secs),
            unhealthy_base_interval: Duration::from_secs(self.unhealthy_base_interval_secs),
            unhealthy_max_interval: Duration::from_secs(self.unhealthy_max_interval_secs),
            backoff_multiplier_cap: self.backoff_multiplier_cap,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusServerConfig {
    /// Serve the availability state over HTTP.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,
}

impl Default for StatusServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8090".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

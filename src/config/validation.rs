//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("monitor.unhealthy_max_interval_secs ({max}) is below monitor.unhealthy_base_interval_secs ({base})")]
    MaxBelowBase { base: u64, max: u64 },

    #[error("monitor.base_url {url:?} is invalid: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("monitor.health_path {0:?} must start with '/'")]
    HealthPath(String),

    #[error("{field} {value:?} is not a socket address")]
    Address { field: &'static str, value: String },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let monitor = &config.monitor;

    let positive = [
        ("monitor.failure_threshold", u64::from(monitor.failure_threshold)),
        ("monitor.healthy_interval_secs", monitor.healthy_interval_secs),
        ("monitor.unhealthy_base_interval_secs", monitor.unhealthy_base_interval_secs),
        ("monitor.unhealthy_max_interval_secs", monitor.unhealthy_max_interval_secs),
        ("monitor.backoff_multiplier_cap", u64::from(monitor.backoff_multiplier_cap)),
        ("monitor.probe_timeout_ms", monitor.probe_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if monitor.unhealthy_max_interval_secs < monitor.unhealthy_base_interval_secs {
        errors.push(ValidationError::MaxBelowBase {
            base: monitor.unhealthy_base_interval_secs,
            max: monitor.unhealthy_max_interval_secs,
        });
    }

    match Url::parse(&monitor.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::BaseUrl {
            url: monitor.base_url.clone(),
            reason: format!("unsupported scheme {}", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::BaseUrl {
            url: monitor.base_url.clone(),
            reason: e.to_string(),
        }),
    }

    if !monitor.health_path.starts_with('/') {
        errors.push(ValidationError::HealthPath(monitor.health_path.clone()));
    }

    if config.status.enabled {
        check_address(&mut errors, "status.bind_address", &config.status.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}

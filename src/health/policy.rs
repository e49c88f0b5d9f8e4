//! Probe scheduling policy.

use std::time::Duration;

use crate::resilience::backoff::unhealthy_backoff;

/// Thresholds and intervals that drive the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// Consecutive failed probes required before flipping to offline.
    pub failure_threshold: u32,
    /// Delay before the next probe after a success.
    pub healthy_interval: Duration,
    /// Starting delay after a failure.
    pub unhealthy_base_interval: Duration,
    /// Ceiling for the backoff delay.
    pub unhealthy_max_interval: Duration,
    /// Upper bound on the exponential multiplier.
    pub backoff_multiplier_cap: u32,
    /// Hard deadline per probe attempt.
    pub probe_timeout: Duration,
}

impl MonitorPolicy {
    /// Delay until the next probe, given the outcome of the one just processed
    /// and the failure streak after it.
    pub fn next_delay(&self, succeeded: bool, consecutive_failures: u32) -> Duration {
        if succeeded {
            return self.healthy_interval;
        }

        unhealthy_backoff(
            consecutive_failures,
            self.failure_threshold,
            self.unhealthy_base_interval,
            self.unhealthy_max_interval,
            self.backoff_multiplier_cap,
        )
    }
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            healthy_interval: Duration::from_secs(30),
            unhealthy_base_interval: Duration::from_secs(30),
            unhealthy_max_interval: Duration::from_secs(300),
            backoff_multiplier_cap: 10,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

//! Backend availability state machine.
//!
//! # States
//! - Online: the backend answered its last probe (or has not yet failed
//!   enough probes in a row to be declared down)
//! - Offline: consecutive failures reached the threshold
//!
//! # State Transitions
//! ```text
//! Offline → Online: one successful probe
//! Online → Offline: consecutive failures >= failure_threshold
//! ```
//!
//! # Design Decisions
//! - Asymmetric hysteresis: fast recovery, slow to declare dead
//! - The failure counter is internal; observers only see `AvailabilityState`
//! - The monitor starts pessimistic (offline, checking)

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The externally observable availability of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityState {
    /// Last debounced health determination.
    pub is_online: bool,
    /// True only while the very first probe of the monitor is in flight.
    pub is_checking: bool,
    /// Wall-clock time of the most recently completed probe attempt.
    pub last_checked: Option<DateTime<Utc>>,
}

impl AvailabilityState {
    /// Whether the next probe is the first one to complete.
    pub fn is_initial_check(&self) -> bool {
        self.is_checking && self.last_checked.is_none()
    }

    /// What a presentation layer should render for this state.
    pub fn view(&self) -> StatusView {
        if self.is_initial_check() {
            StatusView::Checking
        } else if !self.is_online && !self.is_checking {
            StatusView::Offline
        } else {
            StatusView::Online
        }
    }
}

impl Default for AvailabilityState {
    fn default() -> Self {
        Self {
            is_online: false,
            is_checking: true,
            last_checked: None,
        }
    }
}

/// Rendering gate derived from an [`AvailabilityState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusView {
    /// Startup: show a "checking connection" indicator.
    Checking,
    /// Show the offline banner instead of content.
    Offline,
    /// Render normal content.
    Online,
}

/// Result of feeding one probe outcome into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    CameOnline,
    WentOffline,
}

/// Consecutive-failure bookkeeping behind `is_online`.
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    consecutive_failures: u32,
    is_online: bool,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Report a successful probe.
    pub fn record_success(&mut self) -> Transition {
        self.consecutive_failures = 0;

        if self.is_online {
            return Transition::None;
        }

        self.is_online = true;
        Transition::CameOnline
    }

    /// Report a failed probe.
    pub fn record_failure(&mut self, failure_threshold: u32) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.is_online && self.consecutive_failures >= failure_threshold {
            self.is_online = false;
            return Transition::WentOffline;
        }

        Transition::None
    }
}

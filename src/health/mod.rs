//! Backend availability subsystem.
//!
//! # Data Flow
//! ```text
//! monitor.rs:
//!     Timer fires
//!     → probe.rs (GET health endpoint, under a deadline)
//!     → state.rs (tracker: debounce failures, instant recovery)
//!     → policy.rs (next delay: healthy interval or backoff)
//!     → publish AvailabilityState to watchers
//! ```
//!
//! # Design Decisions
//! - Single writer (the monitor task), many readers (watch channel)
//! - At most one probe in flight and one timer pending per monitor
//! - Monitors are plain values passed to consumers, never globals

pub mod monitor;
pub mod policy;
pub mod probe;
pub mod state;

pub use monitor::AvailabilityMonitor;
pub use policy::MonitorPolicy;
pub use probe::{HealthProbe, HttpProbe, ProbeError};
pub use state::{AvailabilityState, StatusView};

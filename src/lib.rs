//! Backend availability monitor library.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod status;

pub use config::AppConfig;
pub use health::{AvailabilityMonitor, AvailabilityState, HttpProbe, MonitorPolicy};
pub use lifecycle::Shutdown;

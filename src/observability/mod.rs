//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Monitor produces:
//!     → logging.rs (structured log events: transitions, probe failures)
//!     → metrics.rs (probe counters, availability gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;

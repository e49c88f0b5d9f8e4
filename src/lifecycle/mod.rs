//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Start monitor → Serve status
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop monitor → Drain status server → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The monitor is stopped before the server drains, so no probe outlives it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

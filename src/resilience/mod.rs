//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe result processed by the monitor:
//!     → success: healthy interval
//!     → failure: backoff.rs (exponential in excess failures, capped)
//! ```
//!
//! # Design Decisions
//! - Every probe has a deadline; a timeout counts as a failure
//! - No give-up: a down backend is probed forever at the capped interval
//! - Deterministic delays (no jitter), one monitor per backend

pub mod backoff;

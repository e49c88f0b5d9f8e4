//! Status endpoint for presentation layers.
//!
//! # Responsibilities
//! - Serve the monitor's `AvailabilityState` as JSON, with the derived view
//! - Report the daemon's own liveness
//!
//! # Design Decisions
//! - Read-only: handlers hold a watch receiver, never the monitor
//! - Always 200; consumers gate on `view`, not on the HTTP status

pub mod handlers;

use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::health::state::AvailabilityState;
use self::handlers::{get_live, get_status, StatusState};

#[allow(deprecated)]
pub fn status_router(availability: watch::Receiver<AvailabilityState>) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/status/live", get(get_live))
        .with_state(StatusState { availability })
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Status server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Status server stopped");
    Ok(())
}

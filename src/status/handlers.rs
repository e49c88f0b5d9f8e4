use axum::{extract::State, Json};
use serde::Serialize;
use tokio::sync::watch;

use crate::health::state::{AvailabilityState, StatusView};

/// State injected into status handlers.
#[derive(Clone)]
pub struct StatusState {
    pub availability: watch::Receiver<AvailabilityState>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub state: AvailabilityState,
    pub view: StatusView,
}

pub async fn get_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let current = state.availability.borrow().clone();
    let view = current.view();

    Json(StatusResponse {
        state: current,
        view,
    })
}

pub async fn get_live() -> &'static str {
    "ok"
}

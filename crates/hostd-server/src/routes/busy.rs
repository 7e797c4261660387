use axum::extract::State;
use axum::Json;
use hostd_core::busy::BusySnapshot;

use crate::state::AppState;

/// GET /v1/busy: current busy-state snapshot. Never waits on admission.
pub async fn get_busy(State(app): State<AppState>) -> Json<BusySnapshot> {
    Json(app.engine.snapshot())
}

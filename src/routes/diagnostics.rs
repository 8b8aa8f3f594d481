//! `GET /api/diagnostics`: identity service and database connectivity.

use axum::extract::State;
use axum::response::Json;

use crate::services::diagnostics::{self, DiagnosticsReport};
use crate::state::AppState;

pub async fn report(State(state): State<AppState>) -> Json<DiagnosticsReport> {
    Json(diagnostics::run(state.identity_config.as_ref(), state.profiles.is_configured()).await)
}

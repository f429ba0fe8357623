use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: bool,
    pub storage: bool,
}

/// Liveness plus dependency probes. Never raises; degraded dependencies
/// show up as `false`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "health",
    responses((status = 200, description = "Service health", body = HealthStatus)),
)]
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let database = state.db.ping().await.is_ok();
    let storage = state.store.healthy().await;

    Json(HealthStatus {
        status: if database && storage { "ok" } else { "degraded" },
        database,
        storage,
    })
}

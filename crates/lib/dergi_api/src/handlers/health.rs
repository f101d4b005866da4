//! Health check.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /api/health`: store connectivity and row counts.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    if let Err(e) = state.store.ping().await {
        warn!(error = %e, "health check: store unreachable");
        return Ok(Json(HealthResponse {
            success: false,
            db_connected: false,
            user_count: 0,
            role_count: 0,
            version: dergi_core::version().to_string(),
        }));
    }

    Ok(Json(HealthResponse {
        success: true,
        db_connected: true,
        user_count: state.store.count_users().await?,
        role_count: state.store.count_roles().await?,
        version: dergi_core::version().to_string(),
    }))
}

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::ServiceError;
use crate::services::stock_release::ReleaseOutcome;
use crate::{ApiResponse, AppState};

/// POST /stock-release/trigger
///
/// Runs one reaper pass with the configured batch size, same as a worker
/// tick.
pub async fn trigger(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReleaseOutcome>>, ServiceError> {
    let outcome = state
        .stock_release_service
        .process_expired_reservations(state.config.release_batch_size)
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// GET /stock-release/status
pub async fn status() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "worker_status": "active",
    })))
}

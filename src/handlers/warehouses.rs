use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::warehouse;
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// GET /warehouses/{warehouse_id}
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<String>,
) -> Result<Json<ApiResponse<warehouse::Model>>, ServiceError> {
    let warehouse_id = parse_warehouse_id(&warehouse_id)?;
    let model = state.warehouse_service.get_warehouse(warehouse_id).await?;
    Ok(Json(ApiResponse::success(model)))
}

/// PUT /warehouses/{warehouse_id}/active
///
/// Deactivation is rejected with PRECONDITION_FAILED while any transfer
/// touching the warehouse is still in flight.
pub async fn set_active(
    State(state): State<AppState>,
    Path(warehouse_id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let warehouse_id = parse_warehouse_id(&warehouse_id)?;
    state
        .warehouse_service
        .set_active(warehouse_id, req.is_active)
        .await?;
    Ok(Json(ApiResponse::message("warehouse updated")))
}

fn parse_warehouse_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid warehouse id format: {raw}")))
}

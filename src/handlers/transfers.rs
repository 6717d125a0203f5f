use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::warehouse_transfer::TransferStatus;
use crate::errors::ServiceError;
use crate::services::transfers::{CreateTransferRequest, TransferResponse};
use crate::{ApiResponse, AppState};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct UpdateTransferStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferListQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct TransferListResponse {
    pub items: Vec<TransferResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// POST /transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(req): Json<CreateTransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>, ServiceError> {
    let transfer = state.transfer_service.create_transfer(req).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// PUT /transfers/{transfer_id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Json(req): Json<UpdateTransferStatusRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let transfer_id = parse_transfer_id(&transfer_id)?;
    let status = TransferStatus::from_str(&req.status).ok_or_else(|| {
        ServiceError::Validation(format!("unknown transfer status: {}", req.status))
    })?;

    state
        .transfer_service
        .update_status(transfer_id, status)
        .await?;
    Ok(Json(ApiResponse::message("transfer status updated")))
}

/// POST /transfers/{transfer_id}/execute
pub async fn execute_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let transfer_id = parse_transfer_id(&transfer_id)?;
    state.transfer_service.execute_transfer(transfer_id).await?;
    Ok(Json(ApiResponse::message("transfer executed successfully")))
}

/// GET /transfers/{transfer_id}
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<ApiResponse<TransferResponse>>, ServiceError> {
    let transfer_id = parse_transfer_id(&transfer_id)?;
    let transfer = state.transfer_service.get_transfer(transfer_id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// GET /transfers/warehouse/{warehouse_id}
pub async fn get_transfers_by_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<String>,
    Query(query): Query<TransferListQuery>,
) -> Result<Json<ApiResponse<TransferListResponse>>, ServiceError> {
    let warehouse_id = Uuid::parse_str(&warehouse_id).map_err(|_| {
        ServiceError::InvalidArgument(format!("invalid warehouse id format: {warehouse_id}"))
    })?;

    if query.limit == 0 || query.limit > MAX_LIMIT {
        return Err(ServiceError::InvalidArgument(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let (items, total) = state
        .transfer_service
        .get_transfers_by_warehouse(warehouse_id, query.limit, query.offset)
        .await?;

    Ok(Json(ApiResponse::success(TransferListResponse {
        items,
        total,
        limit: query.limit,
        offset: query.offset,
    })))
}

fn parse_transfer_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid transfer id format: {raw}")))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::orders::{CheckoutInput, CheckoutOutput, OrderDetails, OrderListItem};
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

/// POST /order/checkout
///
/// Returns the bare `CheckoutOutput` rather than the usual envelope: the
/// body is persisted against the idempotency key, and a replay must be
/// byte-identical to the first response.
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CheckoutInput>,
) -> Result<Json<CheckoutOutput>, ServiceError> {
    let output = state.order_service.checkout(user_id, input).await?;
    Ok(Json(output))
}

/// POST /order/{order_id}/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let order_id = parse_order_id(&order_id)?;
    state.order_service.confirm_payment(order_id).await?;
    Ok(Json(ApiResponse::message("payment confirmed successfully")))
}

/// POST /order/{order_id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let order_id = parse_order_id(&order_id)?;
    state.order_service.cancel_order(order_id).await?;
    Ok(Json(ApiResponse::message("order cancelled successfully")))
}

/// GET /order/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let order_id = parse_order_id(&order_id)?;
    let details = state.order_service.get_order_details(order_id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// GET /order/list
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderListItem>>>, ServiceError> {
    let (orders, total) = state
        .order_service
        .get_user_orders(user_id, query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, query.page, query.limit,
    ))))
}

fn parse_order_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid order id format: {raw}")))
}

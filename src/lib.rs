//! Multi-warehouse inventory reservation and fulfillment API.
//!
//! The core keeps `product_stock` counters consistent under three concurrent
//! pressures: checkouts reserving stock, operators transferring stock
//! between warehouses, and the background reaper expiring stale
//! reservations. All correctness rests on guarded row-level UPDATEs and
//! single-transaction operations; there are no in-process locks.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod services;
pub mod stock;
pub mod workers;

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::services::orders::OrderService;
use crate::services::stock_release::StockReleaseService;
use crate::services::transfers::TransferService;
use crate::services::warehouses::WarehouseService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub order_service: OrderService,
    pub transfer_service: TransferService,
    pub warehouse_service: WarehouseService,
    pub stock_release_service: StockReleaseService,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let order_service = OrderService::new(db.clone(), config.reservation_ttl());
        let transfer_service = TransferService::new(db.clone());
        let warehouse_service = WarehouseService::new(db.clone(), transfer_service.clone());
        let stock_release_service = StockReleaseService::new(db.clone());

        Self {
            db,
            config,
            order_service,
            transfer_service,
            warehouse_service,
            stock_release_service,
        }
    }
}

/// Common query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Standard response envelope for everything except checkout, whose body is
/// cached verbatim for idempotent replay.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Builds the HTTP surface.
pub fn api_routes() -> Router<AppState> {
    let order_routes = Router::new()
        .route("/checkout", post(handlers::orders::checkout))
        .route("/list", get(handlers::orders::list_orders))
        .route("/{order_id}", get(handlers::orders::get_order))
        .route(
            "/{order_id}/confirm-payment",
            post(handlers::orders::confirm_payment),
        )
        .route("/{order_id}/cancel", post(handlers::orders::cancel_order));

    let transfer_routes = Router::new()
        .route("/", post(handlers::transfers::create_transfer))
        .route(
            "/warehouse/{warehouse_id}",
            get(handlers::transfers::get_transfers_by_warehouse),
        )
        .route("/{transfer_id}", get(handlers::transfers::get_transfer))
        .route(
            "/{transfer_id}/status",
            put(handlers::transfers::update_status),
        )
        .route(
            "/{transfer_id}/execute",
            post(handlers::transfers::execute_transfer),
        );

    let stock_release_routes = Router::new()
        .route("/trigger", post(handlers::stock_release::trigger))
        .route("/status", get(handlers::stock_release::status));

    let warehouse_routes = Router::new()
        .route("/{warehouse_id}", get(handlers::warehouses::get_warehouse))
        .route(
            "/{warehouse_id}/active",
            put(handlers::warehouses::set_active),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/order", order_routes)
        .nest("/transfers", transfer_routes)
        .nest("/stock-release", stock_release_routes)
        .nest("/warehouses", warehouse_routes)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
    }))
}

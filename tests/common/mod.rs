//! Test harness: application state backed by an in-memory SQLite database,
//! driven through the real router.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use warehouse_api::auth::USER_ID_HEADER;
use warehouse_api::config::AppConfig;
use warehouse_api::entities::{
    order, product, product_stock, shop, stock_movement, stock_reservation, warehouse,
};
use warehouse_api::{db, AppState};

/// Deterministic UUID fixture: `uid(1)`, `uid(2)`, ...
pub fn uid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_tests("sqlite::memory:")).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), config);
        let router = warehouse_api::api_routes().with_state(state.clone());

        Self { state, router }
    }

    /// Sends a request through the router and returns `(status, json body)`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(USER_ID_HEADER, user_id.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("failed to build request"),
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not JSON")
        };

        (status, value)
    }

    // ---- fixtures ----

    pub async fn seed_shop(&self, id: Uuid) {
        shop::ActiveModel {
            id: Set(id),
            name: Set(format!("shop-{id}")),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed shop");
    }

    pub async fn seed_warehouse(&self, id: Uuid, shop_id: Uuid, is_active: bool) {
        warehouse::ActiveModel {
            id: Set(id),
            shop_id: Set(shop_id),
            name: Set(format!("warehouse-{id}")),
            is_active: Set(is_active),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed warehouse");
    }

    pub async fn seed_product(&self, id: Uuid) {
        product::ActiveModel {
            id: Set(id),
            sku: Set(format!("SKU-{id}")),
            name: Set(format!("product-{id}")),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product");
    }

    pub async fn seed_stock(&self, product_id: Uuid, warehouse_id: Uuid, on_hand: i32, reserved: i32) {
        product_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            warehouse_id: Set(warehouse_id),
            on_hand: Set(on_hand),
            reserved: Set(reserved),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed stock");
    }

    // ---- direct reads for assertions ----

    pub async fn stock(&self, product_id: Uuid, warehouse_id: Uuid) -> (i32, i32) {
        let row = product_stock::Entity::find()
            .filter(product_stock::Column::ProductId.eq(product_id))
            .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
            .one(&*self.state.db)
            .await
            .expect("failed to read stock")
            .expect("stock row missing");
        (row.on_hand, row.reserved)
    }

    pub async fn order(&self, order_id: Uuid) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.state.db)
            .await
            .expect("failed to read order")
            .expect("order missing")
    }

    pub async fn order_count(&self) -> u64 {
        use sea_orm::PaginatorTrait;
        order::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("failed to count orders")
    }

    pub async fn reservations_for(&self, order_id: Uuid) -> Vec<stock_reservation::Model> {
        stock_reservation::Entity::find()
            .filter(stock_reservation::Column::OrderId.eq(order_id))
            .all(&*self.state.db)
            .await
            .expect("failed to read reservations")
    }

    pub async fn movements(&self, product_id: Uuid, warehouse_id: Uuid) -> Vec<stock_movement::Model> {
        stock_movement::Entity::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(&*self.state.db)
            .await
            .expect("failed to read movements")
    }

    /// Forces every reservation of an order into the past so the reaper
    /// will pick it up; tests never sleep.
    pub async fn expire_reservations(&self, order_id: Uuid, at: DateTime<Utc>) {
        let rows = self.reservations_for(order_id).await;
        for row in rows {
            let mut active: stock_reservation::ActiveModel = row.into();
            active.expires_at = Set(at);
            active
                .update(&*self.state.db)
                .await
                .expect("failed to backdate reservation");
        }
    }

    /// Checks movement conservation for one `(product, warehouse)` pair
    /// against its initially seeded counters: the signed movement sums must
    /// reproduce the current `on_hand` and `reserved` values.
    pub async fn assert_movement_conservation(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        initial_on_hand: i32,
        initial_reserved: i32,
    ) {
        let movements = self.movements(product_id, warehouse_id).await;
        let sum = |movement_type: &str| -> i32 {
            movements
                .iter()
                .filter(|m| m.movement_type == movement_type)
                .map(|m| m.qty)
                .sum()
        };

        let expected_on_hand = initial_on_hand + sum("INBOUND") - sum("OUTBOUND") - sum("COMMIT");
        let expected_reserved = initial_reserved + sum("RESERVE") - sum("RELEASE") - sum("COMMIT");

        let (on_hand, reserved) = self.stock(product_id, warehouse_id).await;
        assert_eq!(on_hand, expected_on_hand, "on_hand diverged from movement log");
        assert_eq!(reserved, expected_reserved, "reserved diverged from movement log");
        assert!(on_hand >= reserved && reserved >= 0, "stock invariant violated");
    }
}

/// A past instant usable as an expired reservation deadline.
pub fn long_ago() -> DateTime<Utc> {
    Utc::now() - Duration::minutes(90)
}

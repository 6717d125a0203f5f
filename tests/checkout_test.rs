mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use common::{uid, TestApp};

async fn app_with_single_warehouse() -> TestApp {
    let app = TestApp::new().await;
    app.seed_shop(uid(100)).await;
    app.seed_warehouse(uid(1), uid(100), true).await;
    app.seed_product(uid(10)).await;
    app
}

#[tokio::test]
async fn happy_checkout_reserves_stock() {
    let app = app_with_single_warehouse().await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;

    let before = Utc::now();
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 3, "price": 100}],
                "reservation_minutes": 10,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
    assert_eq!(body["total"], 300);
    assert_eq!(body["status"], "AWAITING_PAYMENT");

    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();
    let order = app.order(order_id).await;
    assert_eq!(order.status, "AWAITING_PAYMENT");
    assert_eq!(order.total, 300);
    assert_eq!(order.user_id, uid(50));

    // Reservation expiry honors the requested 10 minute TTL.
    let expires_at: DateTime<Utc> = body["reservation_expires_at"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(expires_at > before + Duration::minutes(9));
    assert!(expires_at < before + Duration::minutes(11));

    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 3));

    let reservations = app.reservations_for(order_id).await;
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].status, "PENDING");
    assert_eq!(reservations[0].qty, 3);
    assert_eq!(reservations[0].warehouse_id, uid(1));

    let movements = app.movements(uid(10), uid(1)).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "RESERVE");
    assert_eq!(movements[0].qty, 3);
    assert_eq!(movements[0].ref_type, "ORDER_CHECKOUT");
    assert_eq!(movements[0].ref_id, order_id);
}

#[tokio::test]
async fn out_of_stock_checkout_leaves_no_trace() {
    let app = app_with_single_warehouse().await;
    app.seed_stock(uid(10), uid(1), 2, 0).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 3, "price": 100}],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock(uid(10), uid(1)).await, (2, 0));
    assert!(app.movements(uid(10), uid(1)).await.is_empty());
}

#[tokio::test]
async fn checkout_validates_input() {
    let app = app_with_single_warehouse().await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;

    // Empty item list.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({"shop_id": uid(100).to_string(), "items": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // Zero quantity.
    let (status, _) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 0, "price": 100}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Duplicate product in one order.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [
                    {"product_id": uid(10).to_string(), "qty": 1, "price": 100},
                    {"product_id": uid(10).to_string(), "qty": 2, "price": 100},
                ],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // Malformed product id.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": "not-a-uuid", "qty": 1, "price": 100}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

    // Nothing was persisted by any of the rejected calls.
    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 0));
}

#[tokio::test]
async fn checkout_requires_an_authenticated_user() {
    let app = app_with_single_warehouse().await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            None,
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 1, "price": 100}],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn picker_prefers_largest_availability_then_lowest_id() {
    let app = TestApp::new().await;
    app.seed_shop(uid(100)).await;
    app.seed_warehouse(uid(1), uid(100), true).await;
    app.seed_warehouse(uid(2), uid(100), true).await;
    app.seed_product(uid(10)).await;
    app.seed_stock(uid(10), uid(1), 5, 0).await;
    app.seed_stock(uid(10), uid(2), 8, 0).await;

    // Largest availability wins.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 2, "price": 10}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();
    let reservations = app.reservations_for(order_id).await;
    assert_eq!(reservations[0].warehouse_id, uid(2));
    assert_eq!(app.stock(uid(10), uid(2)).await, (8, 2));

    // Now both warehouses expose availability 5 and 6; still warehouse 2.
    // Reserve down to a tie, then the lowest warehouse id must win.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 1, "price": 10}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.reservations_for(order_id).await[0].warehouse_id, uid(2));

    // Availability is now 5 vs 5: deterministic tie-break on warehouse id.
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 1, "price": 10}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.reservations_for(order_id).await[0].warehouse_id, uid(1));
}

#[tokio::test]
async fn picker_ignores_inactive_warehouses_and_other_shops() {
    let app = TestApp::new().await;
    app.seed_shop(uid(100)).await;
    app.seed_shop(uid(200)).await;
    app.seed_warehouse(uid(1), uid(100), false).await; // inactive
    app.seed_warehouse(uid(2), uid(200), true).await; // other shop
    app.seed_product(uid(10)).await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;
    app.seed_stock(uid(10), uid(2), 10, 0).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": 1, "price": 100}],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {body}");
    assert_eq!(body["error"]["code"], "VALIDATION");
}

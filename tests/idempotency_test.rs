mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{uid, TestApp};

async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    app.seed_shop(uid(100)).await;
    app.seed_warehouse(uid(1), uid(100), true).await;
    app.seed_product(uid(10)).await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;
    app
}

fn checkout_body(idem_key: &str, payload_hash: &str) -> serde_json::Value {
    json!({
        "shop_id": uid(100).to_string(),
        "items": [{"product_id": uid(10).to_string(), "qty": 3, "price": 100}],
        "idem_key": idem_key,
        "payload_hash": payload_hash,
    })
}

#[tokio::test]
async fn replayed_checkout_returns_identical_response_and_one_order() {
    let app = seeded_app().await;

    let (status, first) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k1", "h1")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {first}");

    let (status, second) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k1", "h1")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second, "replay must be byte-identical");

    // Exactly one order, one reservation set, one reservation's worth of
    // stock.
    assert_eq!(app.order_count().await, 1);
    let order_id = first["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.reservations_for(order_id).await.len(), 1);
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 3));

    // Only the first call wrote a movement.
    assert_eq!(app.movements(uid(10), uid(1)).await.len(), 1);
}

#[tokio::test]
async fn key_reuse_with_different_payload_conflicts() {
    let app = seeded_app().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k1", "h1")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k1", "h2")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    assert_eq!(app.order_count().await, 1);
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 3));
}

#[tokio::test]
async fn claimed_key_without_response_is_an_in_flight_conflict() {
    let app = seeded_app().await;

    // A key claimed by a checkout that has not committed its response yet.
    {
        use chrono::Utc;
        use sea_orm::{ActiveModelTrait, Set};
        use warehouse_api::entities::idempotency_request;

        idempotency_request::ActiveModel {
            key: Set("k-inflight".to_string()),
            endpoint: Set("checkout".to_string()),
            payload_hash: Set("h1".to_string()),
            order_id: Set(None),
            response_body: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*app.state.db)
        .await
        .expect("failed to stage idempotency row");
    }

    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k-inflight", "h1")),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 0));
}

#[tokio::test]
async fn different_keys_create_independent_orders() {
    let app = seeded_app().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k1", "h1")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(checkout_body("k2", "h1")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.order_count().await, 2);
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 6));
}

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{long_ago, uid, TestApp};

async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    app.seed_shop(uid(100)).await;
    app.seed_warehouse(uid(1), uid(100), true).await;
    app.seed_product(uid(10)).await;
    app.seed_stock(uid(10), uid(1), 10, 0).await;
    app
}

async fn checkout(app: &TestApp, qty: i32, price: i64) -> Uuid {
    let (status, body) = app
        .request(
            Method::POST,
            "/order/checkout",
            Some(uid(50)),
            Some(json!({
                "shop_id": uid(100).to_string(),
                "items": [{"product_id": uid(10).to_string(), "qty": qty, "price": price}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    body["order_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn confirm_payment_commits_stock_and_reservations() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.order(order_id).await;
    assert_eq!(order.status, "PAID");

    assert_eq!(app.stock(uid(10), uid(1)).await, (7, 0));

    let reservations = app.reservations_for(order_id).await;
    assert!(reservations.iter().all(|r| r.status == "COMMITTED"));

    let movements = app.movements(uid(10), uid(1)).await;
    let types: Vec<&str> = movements.iter().map(|m| m.movement_type.as_str()).collect();
    assert_eq!(types, vec!["RESERVE", "COMMIT"]);
    assert_eq!(movements[1].ref_type, "ORDER_PAYMENT");

    app.assert_movement_conservation(uid(10), uid(1), 10, 0).await;
}

#[tokio::test]
async fn confirming_twice_fails_and_commits_at_most_once() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // The second confirmation must not have touched stock.
    assert_eq!(app.stock(uid(10), uid(1)).await, (7, 0));
    assert_eq!(app.order(order_id).await.status, "PAID");
}

#[tokio::test]
async fn cancel_releases_pending_reservations() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/cancel"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.order(order_id).await.status, "CANCELLED");
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 0));

    let reservations = app.reservations_for(order_id).await;
    assert!(reservations.iter().all(|r| r.status == "RELEASED"));

    let movements = app.movements(uid(10), uid(1)).await;
    let types: Vec<&str> = movements.iter().map(|m| m.movement_type.as_str()).collect();
    assert_eq!(types, vec!["RESERVE", "RELEASE"]);
    assert_eq!(movements[1].ref_type, "ORDER_CANCELLED");

    app.assert_movement_conservation(uid(10), uid(1), 10, 0).await;
}

#[tokio::test]
async fn cancelled_orders_cannot_be_confirmed() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/cancel"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert_eq!(app.order(order_id).await.status, "CANCELLED");
}

#[tokio::test]
async fn expired_reservations_block_confirmation() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    app.expire_reservations(order_id, long_ago()).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // The failed confirmation rolled back wholesale: order and stock are
    // untouched.
    assert_eq!(app.order(order_id).await.status, "AWAITING_PAYMENT");
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 3));
}

#[tokio::test]
async fn cancel_after_reaper_expiry_fails_without_double_release() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 3, 100).await;

    app.expire_reservations(order_id, long_ago()).await;

    // Reaper wins the race: releases the stock and expires the order.
    let (status, _) = app
        .request(Method::POST, "/stock-release/trigger", Some(uid(50)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.order(order_id).await.status, "EXPIRED");
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 0));

    // The user's late cancel must fail and must not release again.
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/order/{order_id}/cancel"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    assert_eq!(app.order(order_id).await.status, "EXPIRED");
    assert_eq!(app.stock(uid(10), uid(1)).await, (10, 0));
    app.assert_movement_conservation(uid(10), uid(1), 10, 0).await;
}

#[tokio::test]
async fn unknown_and_malformed_order_ids_are_rejected() {
    let app = seeded_app().await;

    let missing = Uuid::from_u128(9999);
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/order/{missing}/confirm-payment"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = app
        .request(
            Method::POST,
            "/order/not-a-uuid/confirm-payment",
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn order_detail_and_listing() {
    let app = seeded_app().await;
    let order_id = checkout(&app, 2, 150).await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(uid(50)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let detail = &body["data"];
    assert_eq!(detail["total"], 300);
    assert_eq!(detail["status"], "AWAITING_PAYMENT");
    assert_eq!(detail["items"].as_array().unwrap().len(), 1);
    assert_eq!(detail["items"][0]["qty"], 2);
    assert_eq!(detail["items"][0]["price"], 150);

    // The listing is scoped to the authenticated user.
    let (status, body) = app
        .request(Method::GET, "/order/list?page=1&limit=10", Some(uid(50)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total"], 1);
    assert_eq!(data["items"][0]["order_id"], order_id.to_string());
    assert_eq!(data["items"][0]["item_count"], 1);

    let (status, body) = app
        .request(Method::GET, "/order/list", Some(uid(51)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    // Malformed pagination.
    let (status, body) = app
        .request(Method::GET, "/order/list?page=0", Some(uid(50)), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
}

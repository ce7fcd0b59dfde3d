//! Finished-goods reservations and stock adjustments over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, TestApp};
use futures::future::join_all;
use serde_json::json;

async fn reserve(app: &TestApp, order_id: i64, good: i64, quantity: u32) -> StatusCode {
    app.request(
        Method::POST,
        "/api/v1/inventory/reservations",
        Some(json!({"order_id": order_id, "finished_good_id": good, "quantity": quantity})),
    )
    .await
    .status()
}

#[tokio::test]
async fn reservation_beyond_stock_is_unprocessable() {
    let app = TestApp::new().await;

    // HV-12 holds 60 units
    assert_eq!(reserve(&app, 2, 2, 50).await, StatusCode::CREATED);
    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/reservations",
            Some(json!({"order_id": 3, "finished_good_id": 2, "quantity": 11})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("only 10 available"));
}

#[tokio::test]
async fn reservation_for_unknown_good_is_not_found() {
    let app = TestApp::new().await;
    assert_eq!(reserve(&app, 1, 99, 1).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reservation_for_unknown_order_is_rejected() {
    let app = TestApp::new().await;
    assert_eq!(reserve(&app, 404, 2, 1).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adjusting_below_reserved_stock_is_unprocessable() {
    let app = TestApp::new().await;

    // HV-12 holds 60 units
    assert_eq!(reserve(&app, 2, 2, 50).await, StatusCode::CREATED);
    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/finished-goods/2/adjust",
            Some(json!({"delta": -11, "reason": "damaged"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/finished-goods/2/adjust",
            Some(json!({"delta": -10, "reason": "damaged"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["current_stock"], 50);
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let app = TestApp::new().await;

    // spread across the three seeded orders
    let statuses = join_all((0..10).map(|i| reserve(&app, i % 3 + 1, 2, 10))).await;
    let accepted = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == StatusCode::UNPROCESSABLE_ENTITY)
        .count();
    assert_eq!(accepted, 6);
    assert_eq!(rejected, 4);

    let ledger = json_body(
        app.request(Method::GET, "/api/v1/inventory/reservations", None)
            .await,
    )
    .await;
    let held: u64 = ledger["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["quantity"].as_u64().unwrap())
        .sum();
    assert_eq!(held, 60);
}

#[tokio::test]
async fn fulfilling_deducts_stock_and_clears_the_hold() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/reservations",
            Some(json!({"order_id": 1, "finished_good_id": 1, "quantity": 120})),
        )
        .await;
    let reservation_id = json_body(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/inventory/reservations/{}/fulfill", reservation_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["current_stock"], 200);

    let ledger = json_body(
        app.request(Method::GET, "/api/v1/inventory/reservations?order_id=1", None)
            .await,
    )
    .await;
    assert!(ledger["data"].as_array().unwrap().is_empty());

    let again = app
        .request(
            Method::POST,
            &format!("/api/v1/inventory/reservations/{}/fulfill", reservation_id),
            None,
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn releasing_frees_stock_for_other_orders() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/reservations",
            Some(json!({"order_id": 1, "finished_good_id": 3, "quantity": 25})),
        )
        .await;
    let reservation_id = json_body(response).await["data"]["id"].as_i64().unwrap();
    assert_eq!(reserve(&app, 2, 3, 1).await, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/inventory/reservations/{}", reservation_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(reserve(&app, 2, 3, 25).await, StatusCode::CREATED);
}

#[tokio::test]
async fn negative_adjustment_below_zero_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/materials/3/adjust",
            Some(json!({"delta": -181, "reason": "scrap"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let material = json_body(
        app.request(Method::GET, "/api/v1/inventory/materials/3", None)
            .await,
    )
    .await;
    assert_eq!(material["data"]["current_stock"], 180);
}

#[tokio::test]
async fn receiving_a_batch_restocks_and_updates_low_stock_report() {
    let app = TestApp::new().await;

    let before = json_body(app.request(Method::GET, "/api/v1/inventory/low-stock", None).await).await;
    let low_ids: Vec<i64> = before["data"]["materials"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(low_ids, vec![2, 3]);

    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/materials/3/batches",
            Some(json!({"batch_number": "PC-2291", "quantity": 600})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["current_stock"], 780);
    assert!(body["data"]["last_restocked"].is_string());
    assert!(body["data"]["batches"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["batch_number"] == "PC-2291"));

    let after = json_body(app.request(Method::GET, "/api/v1/inventory/low-stock", None).await).await;
    assert_eq!(after["data"]["materials"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn finished_goods_csv_export_lists_every_good() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/inventory/finished-goods/export", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = common::text_body(response).await;
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("MB-7"));
}

//! Integration tests for the HTTP surface, driven through the full router.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::http::{StatusCode, header};
use futures::StreamExt;
use serde_json::json;
use tower::ServiceExt;

use orderdesk_integration_tests::{TestApp, get_request, json_request, login, operator, send};

async fn logged_in() -> (TestApp, axum::Router, String) {
    let app = TestApp::new();
    let router = app.router();
    let cookie = login(&router, &operator(7, "Ana")).await;
    (app, router, cookie)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let router = app.router();

    let (status, _) = send(&router, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, get_request("/health/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "memory");
    assert_eq!(body["live_connections"], 0);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_creates_order() {
    let app = TestApp::new();
    let router = app.router();
    let soup = app.catalog_item("Zeamă", 50);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/checkout",
            None,
            &json!({
                "name": "Ion",
                "phone": "069123456",
                "items": [{ "id": soup.as_i64(), "quantity": 130 }, { "id": 9999 }],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["order_id"].is_i64());
    assert_eq!(app.store.order_count(), 1);
}

#[tokio::test]
async fn test_checkout_without_available_items_is_rejected() {
    let app = TestApp::new();
    let router = app.router();

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/checkout",
            None,
            &json!({
                "customer_name": "Ion",
                "customer_phone": "069123456",
                "items": [{ "id": 1, "quantity": 1 }],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
    assert_eq!(app.store.order_count(), 0);
}

// =============================================================================
// Staff orders
// =============================================================================

#[tokio::test]
async fn test_staff_routes_require_session() {
    let app = TestApp::new();
    let router = app.router();

    for uri in ["/staff/orders", "/staff/orders/1", "/staff/session", "/staff/events"] {
        let (status, _) = send(&router, get_request(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = send(
        &router,
        json_request("POST", "/staff/orders/1/status", None, &json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_probe() {
    let (_app, router, cookie) = logged_in().await;

    let (status, body) = send(&router, get_request("/staff/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ana");
    assert_eq!(body["id"], 7);
}

#[tokio::test]
async fn test_order_mutations_over_http() {
    let (app, router, cookie) = logged_in().await;
    let cookie = Some(cookie.as_str());
    let item = app.catalog_item("Sarmale", 85);
    let order = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 2)]))
        .await
        .unwrap();
    let id = order.order.id;
    let item_id = order.items[0].id;

    let (status, body) = send(&router, get_request("/staff/orders", cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/staff/orders/{id}/status"),
            cookie,
            &json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("new"));

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/staff/orders/{id}/status"),
            cookie,
            &json!({ "status": "confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["history"][0]["actor"]["name"], "Ana");

    let (status, _) = send(
        &router,
        json_request(
            "POST",
            &format!("/staff/orders/{id}/items"),
            cookie,
            &json!({ "items": [{ "item_id": 999_999, "quantity": 1 }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/staff/orders/{id}/items"),
            cookie,
            &json!({ "items": [{ "item_id": item_id.as_i64(), "quantity": 1 }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
    assert_eq!(body["items"][0]["quantity"], 1);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/staff/orders/{id}/customer"),
            cookie,
            &json!({ "address": "str. Puşkin 5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer"]["address"], "str. Puşkin 5");

    let (status, body) = send(&router, get_request(&format!("/staff/orders/{id}"), cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_array().unwrap().len(), 3);

    let (status, _) = send(&router, get_request("/staff/orders/424242", cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Push registration
// =============================================================================

#[tokio::test]
async fn test_push_registration() {
    let (app, router, cookie) = logged_in().await;
    let cookie = Some(cookie.as_str());

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/staff/push/token",
            cookie,
            &json!({ "token": "fcm-token-1", "lang": "ru" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "token");
    assert_eq!(body["locale"], "ru");
    assert_eq!(app.store.destination_count(), 1);

    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/staff/push/subscription",
            cookie,
            &json!({
                "endpoint": "http://push.example.com/insecure",
                "keys": { "p256dh": "x", "auth": "y" },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&router, get_request("/staff/push/vapid-public-key", cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &router,
        json_request(
            "DELETE",
            "/staff/push/token",
            cookie,
            &json!({ "token": "fcm-token-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);
    assert_eq!(app.store.destination_count(), 0);
}

// =============================================================================
// Live stream
// =============================================================================

#[tokio::test]
async fn test_event_stream_over_http() {
    let (app, router, cookie) = logged_in().await;
    let item = app.catalog_item("Compot", 20);

    let response = router
        .clone()
        .oneshot(get_request("/staff/events", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let mut body = response.into_body().into_data_stream();
    let timeout = Duration::from_secs(1);

    let first = tokio::time::timeout(timeout, body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: connected"));
    assert_eq!(app.streams.connection_count(), 1);

    app.lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();

    let next = tokio::time::timeout(timeout, body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&next);
    assert!(text.contains("event: order-created"));
    assert!(text.contains("\"history\":[]"));

    drop(body);
    assert_eq!(app.streams.connection_count(), 0);
}

mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bookbazaar_orderservice::{
    app_state::AppState,
    cart::{CartStore, SessionId},
    checkout::Checkout,
    ledger::InMemoryOrderLedger,
    middleware::{SESSION_COOKIE, SESSION_HEADER},
    routes,
};
use common::{FakeGateway, KEY_SECRET};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let checkout = Checkout::new(
        CartStore::new(),
        Arc::new(InMemoryOrderLedger::new()),
        Arc::new(FakeGateway::new()),
        "INR",
    );
    routes::app(AppState::new(checkout))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let location = res
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, location, body)
}

fn json_request(method: &str, uri: &str, session: &SessionId, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(SESSION_HEADER, session.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, session: &SessionId) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(SESSION_HEADER, session.to_string())
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_session_id_is_minted_when_missing() {
    let app = app();
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let session = res.headers().get(SESSION_HEADER).unwrap().to_str().unwrap();
    assert!(session.parse::<SessionId>().is_ok());
}

#[tokio::test]
async fn test_cart_endpoints_mutate_session_cart() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-a", "quantity": 2, "unit_price": 50000, "title": "Book A" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 100_000);

    let (_, _, body) = send(
        &app,
        json_request("PATCH", "/cart/items/book-a", &session, json!({ "quantity": 3 })),
    )
    .await;
    assert_eq!(body["data"]["lines"][0]["quantity"], 3);
    assert_eq!(body["data"]["total"], 150_000);

    let (status, _, body) = send(
        &app,
        json_request("PATCH", "/cart/items/missing", &session, json!({ "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 150_000);

    let (_, _, body) = send(
        &app,
        json_request("PATCH", "/cart/items/book-a", &session, json!({ "quantity": 0 })),
    )
    .await;
    assert_eq!(body["data"]["lines"], json!([]));

    // Another session never sees this cart.
    let (_, _, body) = send(&app, get("/cart", &SessionId::new())).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_add_rejects_negative_price() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-a", "unit_price": -1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unit_price"));
}

#[tokio::test]
async fn test_add_rejects_line_that_overflows() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-a", "quantity": 2, "unit_price": 4_611_686_018_427_387_904_i64 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("amount"));

    // The session keeps working after the refusal.
    let (status, _, body) = send(&app, get("/cart", &session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    let (status, _, body) = send(&app, get("/checkout", &session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_extreme_quantities_keep_total_intact() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-a", "quantity": i32::MAX, "unit_price": 1_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], i64::from(i32::MAX) * 1_000);

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-b", "quantity": 1, "unit_price": i64::MAX }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-c", "quantity": 1, "unit_price": i64::MAX / 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let total = i64::from(i32::MAX) * 1_000 + i64::MAX / 2;
    assert_eq!(body["data"]["total"], total);

    let (status, _, _) = send(
        &app,
        json_request("PATCH", "/cart/items/book-c", &session, json!({ "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, body) = send(&app, get("/cart", &session)).await;
    assert_eq!(body["data"]["lines"][1]["quantity"], 1);
    assert_eq!(body["data"]["total"], total);
}

#[tokio::test]
async fn test_padded_product_id_can_be_updated_and_removed() {
    let app = app();
    let session = SessionId::new();

    send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": " book-a ", "quantity": 1, "unit_price": 100 }),
        ),
    )
    .await;

    let (_, _, body) = send(
        &app,
        json_request("PATCH", "/cart/items/%20book-a%20", &session, json!({ "quantity": 4 })),
    )
    .await;
    assert_eq!(body["data"]["lines"][0]["product_id"], "book-a");
    assert_eq!(body["data"]["total"], 400);

    let (_, _, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/cart/items/%20book-a")
            .header(SESSION_HEADER, session.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"]["lines"], json!([]));
}

#[tokio::test]
async fn test_session_cookie_binds_form_posts() {
    let app = app();
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    let session: SessionId = res
        .headers()
        .get(SESSION_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    send(
        &app,
        json_request(
            "POST",
            "/cart/items",
            &session,
            json!({ "product_id": "book-a", "quantity": 2, "unit_price": 50_000 }),
        ),
    )
    .await;

    // A request carrying only the cookie sees the same cart.
    let cookie_pair = cookie.split(';').next().unwrap().to_string();
    let (_, _, body) = send(
        &app,
        Request::builder()
            .uri("/cart")
            .header(header::COOKIE, cookie_pair)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"]["total"], 100_000);
}

#[tokio::test]
async fn test_checkout_on_empty_cart_is_bad_request() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(&app, json_request("POST", "/checkout", &session, json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], Value::Null);
    assert!(body["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_checkout_and_verify_redirects_to_confirmation() {
    let app = app();
    let session = SessionId::new();

    for (product, qty, price) in [("book-a", 2, 50_000), ("book-b", 1, 30_000)] {
        send(
            &app,
            json_request(
                "POST",
                "/cart/items",
                &session,
                json!({ "product_id": product, "quantity": qty, "unit_price": price }),
            ),
        )
        .await;
    }

    let (_, _, summary) = send(&app, get("/checkout", &session)).await;
    assert_eq!(summary["data"]["total"], 130_000);
    assert_eq!(summary["data"]["total_display"], "1300.00");

    let (status, _, body) = send(
        &app,
        json_request("POST", "/checkout", &session, json!({ "full_name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let handle = &body["data"];
    assert_eq!(handle["amount"], 130_000);
    assert_eq!(handle["currency"], "INR");
    assert_eq!(handle["key_id"], common::KEY_ID);
    assert_eq!(handle["order"]["status"], "pending");
    assert_eq!(handle["order"]["contact"]["email"], "N/A");

    let order_id = handle["order"]["id"].as_i64().unwrap();
    let gateway_order_ref = handle["gateway_order_ref"].as_str().unwrap();
    let signature =
        bookbazaar_orderservice::api::razorpay::sign_payment(KEY_SECRET, gateway_order_ref, "pay_1");
    let form = format!(
        "order_id={order_id}&razorpay_order_id={gateway_order_ref}&razorpay_payment_id=pay_1&razorpay_signature={signature}"
    );

    let (status, location, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/checkout/verify")
            .header(SESSION_HEADER, session.to_string())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = location.unwrap();
    assert_eq!(location, format!("/orders/{order_id}/success"));

    let (status, _, body) = send(&app, get(&location, &session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "paid");
    assert_eq!(body["data"]["total_display"], "1300.00");

    let (_, _, cart) = send(&app, get("/cart", &session)).await;
    assert_eq!(cart["data"]["lines"], json!([]));
}

#[tokio::test]
async fn test_verify_with_missing_parameters_reports_reason() {
    let app = app();
    let session = SessionId::new();

    let (status, _, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/checkout/verify")
            .header(SESSION_HEADER, session.to_string())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("order_id=1&razorpay_order_id=order_1"))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("razorpay_payment_id"));
    assert!(message.contains("razorpay_signature"));
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = app();
    let (status, _, _) = send(&app, get("/orders/404", &SessionId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

mod common;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::{json, Value};
use std::str::FromStr;

use common::{address_json, cart_line_json, coupon_fixture, read_json, seed_coupon, spawn_app, TEST_SECRET};
use storefront_checkout::entities::coupon::{self, CouponKind};
use storefront_checkout::services::gateway::sign_payment;

fn dec_field(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected decimal, got {:?}", other),
    }
}

async fn fetch_order(app: &common::TestApp, order_id: &str) -> Value {
    let response = app.get(&format!("/api/v1/orders/{}", order_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await["data"].clone()
}

#[tokio::test]
async fn cod_order_above_threshold_ships_free() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "1200", 1)],
                "userId": "u1",
                "address": address_json(),
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Order Placed"));

    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(order["status"], json!("placed"));
    assert_eq!(dec_field(&order["amounts"]["subtotal"]), dec!(1200));
    assert_eq!(dec_field(&order["amounts"]["shipping"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["discount"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(1200));
    assert_eq!(order["payment"]["method"], json!("cod"));
    assert_eq!(order["payment"]["isVerified"], json!(false));
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cod_order_below_threshold_charges_flat_fee() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "300", 1)],
                "userId": "u1",
                "address": address_json(),
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(dec_field(&order["amounts"]["shipping"]), dec!(50));
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(350));
}

#[tokio::test]
async fn online_flow_creates_intent_then_places_verified_order() {
    let app = spawn_app().await;
    let cart = json!([cart_line_json("p1", "300", 1)]);

    let response = app
        .post_json(
            "/api/v1/checkout/intent",
            json!({ "cartItems": cart, "userId": "u1" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let intent = read_json(response).await;
    // subtotal 300 + fee 50 = 350, in minor units
    assert_eq!(intent["amount"], json!(35_000));
    assert_eq!(intent["currency"], json!("INR"));
    let intent_id = intent["orderId"].as_str().unwrap().to_string();

    let signature = sign_payment(&intent_id, "pay_123", TEST_SECRET);
    let response = app
        .post_json(
            "/api/v1/checkout/verify",
            json!({
                "providerIntentId": intent_id,
                "providerPaymentId": "pay_123",
                "suppliedSignature": signature,
                "cartItems": cart,
                "userId": "u1",
                "address": address_json(),
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(order["payment"]["method"], json!("online"));
    assert_eq!(order["payment"]["isVerified"], json!(true));
    assert_eq!(order["payment"]["providerPaymentId"], json!("pay_123"));
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(350));
}

#[tokio::test]
async fn tampered_signature_returns_exact_error_body_and_writes_nothing() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/checkout/verify",
            json!({
                "providerIntentId": "order_stub_35000",
                "providerPaymentId": "pay_123",
                "suppliedSignature": "0".repeat(64),
                "cartItems": [cart_line_json("p1", "300", 1)],
                "userId": "u1",
                "address": address_json(),
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await, json!({ "error": "Invalid Signature" }));

    let response = app.get("/api/v1/orders?user_id=u1").await;
    let body = read_json(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn expired_coupon_preview_reports_reason() {
    let app = spawn_app().await;
    let mut coupon = coupon_fixture("OLD10", CouponKind::Percentage, dec!(10));
    coupon.active_until = Some(chrono::Utc::now() - chrono::Duration::days(1));
    seed_coupon(&app.db, coupon).await;

    let response = app
        .post_json(
            "/api/v1/checkout/coupon",
            json!({
                "code": "old10",
                "cartItems": [cart_line_json("p1", "1000", 1)],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = read_json(response).await;
    assert_eq!(outcome["applicable"], json!(false));
    assert_eq!(outcome["reason"], json!("Coupon has expired"));
}

#[tokio::test]
async fn coupon_below_min_order_value_rejected() {
    let app = spawn_app().await;
    let mut coupon = coupon_fixture("BIG10", CouponKind::Percentage, dec!(10));
    coupon.min_order_value = dec!(500);
    seed_coupon(&app.db, coupon).await;

    let response = app
        .post_json(
            "/api/v1/checkout/coupon",
            json!({
                "code": "BIG10",
                "cartItems": [cart_line_json("p1", "300", 1)],
            }),
        )
        .await;

    let outcome = read_json(response).await;
    assert_eq!(outcome["applicable"], json!(false));
}

#[tokio::test]
async fn percentage_coupon_discounts_order_and_increments_usage() {
    let app = spawn_app().await;
    let coupon_id = seed_coupon(
        &app.db,
        coupon_fixture("SAVE10", CouponKind::Percentage, dec!(10)),
    )
    .await;

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "1200", 1)],
                "userId": "u1",
                "address": address_json(),
                "couponCode": "save10",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(order["appliedCouponCode"], json!("SAVE10"));
    assert_eq!(dec_field(&order["amounts"]["discount"]), dec!(120));
    assert_eq!(dec_field(&order["amounts"]["shipping"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(1080));

    let stored = coupon::Entity::find_by_id(coupon_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.used_count, 1);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn inapplicable_coupon_degrades_to_no_discount() {
    let app = spawn_app().await;

    // No such code seeded; the order still settles at full price.
    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "1200", 1)],
                "userId": "u1",
                "address": address_json(),
                "couponCode": "NOPE",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(order["appliedCouponCode"], Value::Null);
    assert_eq!(dec_field(&order["amounts"]["discount"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(1200));
}

#[tokio::test]
async fn free_shipping_coupon_waives_fee_below_threshold() {
    let app = spawn_app().await;
    seed_coupon(
        &app.db,
        coupon_fixture("SHIPFREE", CouponKind::FreeShipping, Decimal::ZERO),
    )
    .await;

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "300", 1)],
                "userId": "u1",
                "address": address_json(),
                "couponCode": "SHIPFREE",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(dec_field(&order["amounts"]["shipping"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["discount"]), Decimal::ZERO);
    assert_eq!(dec_field(&order["amounts"]["total"]), dec!(300));
}

#[tokio::test]
async fn oversized_fixed_coupon_clamps_total_to_floor() {
    let app = spawn_app().await;
    seed_coupon(
        &app.db,
        coupon_fixture("FLAT500", CouponKind::Fixed, dec!(500)),
    )
    .await;

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "100", 1)],
                "userId": "u1",
                "address": address_json(),
                "couponCode": "FLAT500",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let order = fetch_order(&app, body["orderId"].as_str().unwrap()).await;
    assert_eq!(dec_field(&order["amounts"]["total"]), Decimal::ONE);
}

#[tokio::test]
async fn empty_cart_is_rejected_before_any_processing() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/checkout/intent",
            json!({ "cartItems": [], "userId": "u1" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_address_field_rejected_for_cod() {
    let app = spawn_app().await;
    let mut address = address_json();
    address["zip"] = json!("");

    let response = app
        .post_json(
            "/api/v1/checkout/cod",
            json!({
                "cartItems": [cart_line_json("p1", "300", 1)],
                "userId": "u1",
                "address": address,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_and_health_endpoints_respond() {
    let app = spawn_app().await;

    let response = app.get("/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], json!("ok"));

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], json!("healthy"));
}

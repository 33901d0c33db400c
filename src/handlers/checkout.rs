use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    entities::order::ShippingAddress,
    errors::ServiceError,
    services::{
        checkout::PaymentCallback,
        coupons::{CouponOutcome, CustomerContext},
    },
    AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::pricing::CartLine;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/verify", post(verify_payment))
        .route("/cod", post(place_cod_order))
        .route("/coupon", post(preview_coupon))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub cart_items: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_new_customer: bool,
    #[serde(default)]
    pub has_redeemed_code: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    /// Provider-assigned intent identifier the client hands to the widget.
    pub order_id: String,
    /// Amount in minor currency units (e.g. paise).
    pub amount: i64,
    pub currency: String,
    pub discount_amount: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub provider_intent_id: String,
    #[validate(length(min = 1))]
    pub provider_payment_id: String,
    #[validate(length(min = 1))]
    pub supplied_signature: String,
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub cart_items: Vec<CartLine>,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub address: ShippingAddress,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub is_new_customer: bool,
    #[serde(default)]
    pub has_redeemed_code: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub success: bool,
    pub message: String,
    pub order_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodOrderRequest {
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub cart_items: Vec<CartLine>,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub address: ShippingAddress,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub is_new_customer: bool,
    #[serde(default)]
    pub has_redeemed_code: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreviewRequest {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub cart_items: Vec<CartLine>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_new_customer: bool,
    #[serde(default)]
    pub has_redeemed_code: bool,
}

fn customer_context(
    user_id: Option<&str>,
    is_new_customer: bool,
    has_redeemed_code: bool,
) -> CustomerContext {
    CustomerContext {
        user_id: user_id.unwrap_or_default().to_string(),
        is_new_customer,
        has_redeemed_code,
    }
}

/// Maps checkout failures to the wire contract the storefront client
/// expects: signature mismatch is a bare 400 `{"error": "Invalid Signature"}`,
/// provider failures a 500 `{"error": ...}`.
fn map_checkout_error(err: ServiceError) -> Response {
    match err {
        ServiceError::InvalidSignature => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "Invalid Signature" })),
        )
            .into_response(),
        ServiceError::PaymentUpstream(_) => {
            let message = err.response_message();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({ "error": message })),
            )
                .into_response()
        }
        other => other.into_response(),
    }
}

/// Price the cart, resolve the coupon, and create a payment intent
#[utoipa::path(
    post,
    path = "/api/v1/checkout/intent",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = CreateIntentResponse),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment provider failure")
    ),
    tag = "Checkout"
)]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateIntentRequest>,
) -> Result<Response, Response> {
    validate_input(&payload).map_err(map_checkout_error)?;

    let customer = customer_context(
        payload.user_id.as_deref(),
        payload.is_new_customer,
        payload.has_redeemed_code,
    );

    let quote = state
        .services
        .checkout
        .begin_online_checkout(&payload.cart_items, payload.coupon_code.as_deref(), &customer)
        .await
        .map_err(map_checkout_error)?;

    Ok(success_response(CreateIntentResponse {
        order_id: quote.provider_intent_id,
        amount: quote.amount_minor,
        currency: quote.currency,
        discount_amount: quote.discount_amount,
    }))
}

/// Verify the provider callback signature and persist the order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderPlacedResponse),
        (status = 400, description = "Invalid signature"),
        (status = 500, description = "Order recording failed after verification")
    ),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Response, Response> {
    validate_input(&payload).map_err(map_checkout_error)?;

    let customer = customer_context(
        Some(&payload.user_id),
        payload.is_new_customer,
        payload.has_redeemed_code,
    );
    let callback = PaymentCallback {
        provider_intent_id: payload.provider_intent_id,
        provider_payment_id: payload.provider_payment_id,
        signature: payload.supplied_signature,
    };

    let order = state
        .services
        .checkout
        .confirm_online_order(
            &callback,
            &payload.cart_items,
            &payload.address,
            &customer,
            payload.coupon_code.as_deref(),
        )
        .await
        .map_err(map_checkout_error)?;

    Ok(created_response(OrderPlacedResponse {
        success: true,
        message: "Order Placed".to_string(),
        order_id: order.id.to_string(),
    }))
}

/// Place a cash-on-delivery order without a payment round trip
#[utoipa::path(
    post,
    path = "/api/v1/checkout/cod",
    request_body = CodOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderPlacedResponse),
        (status = 400, description = "Invalid cart or address", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn place_cod_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CodOrderRequest>,
) -> Result<Response, Response> {
    validate_input(&payload).map_err(map_checkout_error)?;

    let customer = customer_context(
        Some(&payload.user_id),
        payload.is_new_customer,
        payload.has_redeemed_code,
    );

    let order = state
        .services
        .checkout
        .place_cod_order(
            &payload.cart_items,
            &payload.address,
            &customer,
            payload.coupon_code.as_deref(),
        )
        .await
        .map_err(map_checkout_error)?;

    Ok(created_response(OrderPlacedResponse {
        success: true,
        message: "Order Placed".to_string(),
        order_id: order.id.to_string(),
    }))
}

/// Preview a coupon's applicability and discount for the current cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout/coupon",
    request_body = CouponPreviewRequest,
    responses(
        (status = 200, description = "Coupon outcome", body = CouponOutcome),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn preview_coupon(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CouponPreviewRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let customer = customer_context(
        payload.user_id.as_deref(),
        payload.is_new_customer,
        payload.has_redeemed_code,
    );

    let outcome = state
        .services
        .checkout
        .preview_coupon(&payload.code, &payload.cart_items, &customer)
        .await?;

    Ok(success_response(outcome))
}

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    gateway::PaymentGateway, CheckoutService, CouponService, OrderService,
};

/// Standard envelope for successful API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Service container shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub coupons: Arc<CouponService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let coupons = Arc::new(CouponService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            coupons.clone(),
            orders.clone(),
            gateway,
            event_sender,
            config.shipping.clone(),
            config.payment.currency.clone(),
            config.payment.key_secret.clone(),
        ));

        Self {
            checkout,
            orders,
            coupons,
        }
    }
}

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

/// Builds the versioned API router. State is applied by the caller.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/v1/checkout", handlers::checkout_routes())
        .nest("/api/v1/orders", handlers::orders_routes())
        .route("/status", get(status_check))
        .route("/health", get(health_check))
}

async fn status_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus a database round trip.
async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ServiceError> {
    state.db.ping().await?;
    Ok(Json(json!({
        "status": "healthy",
        "database": "reachable",
    })))
}

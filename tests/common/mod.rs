use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_checkout::{
    api_v1_routes,
    config::{AppConfig, PaymentConfig, ShippingConfig},
    db,
    entities::coupon::{self, CouponKind, CouponScope, CouponStatus},
    errors::ServiceError,
    events,
    services::gateway::{PaymentGateway, PaymentIntent},
    AppServices, AppState,
};

/// Shared secret the stubbed provider and the verify endpoint agree on.
pub const TEST_SECRET: &str = "integration_callback_secret";

/// Provider stub: echoes the requested amount back with a deterministic
/// intent id, never touches the network.
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        Ok(PaymentIntent {
            provider_intent_id: format!("order_stub_{}", amount_minor),
            amount_minor,
            currency: currency.to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<DatabaseConnection>,
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: true,
        request_timeout_secs: 5,
        payment: PaymentConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: TEST_SECRET.to_string(),
            api_base: "http://localhost:1".to_string(),
            currency: "INR".to_string(),
            request_timeout_secs: 1,
        },
        shipping: ShippingConfig::default(),
    }
}

/// Boots the full router against a fresh in-memory database. The pool is
/// pinned to a single connection: every pooled sqlite connection would
/// otherwise see its own private in-memory database.
pub async fn spawn_app() -> TestApp {
    let db_config = db::DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = Arc::new(
        db::establish_connection_with_config(&db_config)
            .await
            .expect("in-memory database"),
    );
    db::ensure_schema(&db).await.expect("schema creation");

    let config = test_config();
    let (event_sender, event_receiver) = events::channel(64);
    tokio::spawn(events::process_events(event_receiver));

    let services = AppServices::new(db.clone(), Arc::new(StubGateway), event_sender.clone(), &config);
    let state = Arc::new(AppState {
        db: db.clone(),
        config,
        event_sender,
        services,
    });

    TestApp {
        router: api_v1_routes().with_state(state),
        db,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Response {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> Response {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path, None).await
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// A currently-valid, unrestricted coupon. Tests tweak fields as needed
/// before inserting.
pub fn coupon_fixture(code: &str, kind: CouponKind, value: Decimal) -> coupon::Model {
    let now = Utc::now();
    coupon::Model {
        id: Uuid::new_v4(),
        code: code.to_uppercase(),
        kind,
        value,
        min_order_value: Decimal::ZERO,
        scope: CouponScope::All,
        usage_limit: 0,
        used_count: 0,
        restrict_to_new_customers: false,
        one_use_per_customer: false,
        active_from: now - Duration::days(1),
        active_until: Some(now + Duration::days(30)),
        status: CouponStatus::Active,
        version: 1,
        created_at: now,
        updated_at: None,
    }
}

pub async fn seed_coupon(db: &DatabaseConnection, model: coupon::Model) -> Uuid {
    let id = model.id;
    let active = coupon::ActiveModel {
        id: Set(model.id),
        code: Set(model.code),
        kind: Set(model.kind),
        value: Set(model.value),
        min_order_value: Set(model.min_order_value),
        scope: Set(model.scope),
        usage_limit: Set(model.usage_limit),
        used_count: Set(model.used_count),
        restrict_to_new_customers: Set(model.restrict_to_new_customers),
        one_use_per_customer: Set(model.one_use_per_customer),
        active_from: Set(model.active_from),
        active_until: Set(model.active_until),
        status: Set(model.status),
        version: Set(model.version),
        created_at: Set(model.created_at),
        updated_at: Set(model.updated_at),
    };
    active.insert(db).await.expect("seed coupon");
    id
}

/// One cart line in the wire format the checkout endpoints accept.
pub fn cart_line_json(product_id: &str, unit_price: &str, quantity: i32) -> Value {
    serde_json::json!({
        "productId": product_id,
        "name": format!("Product {}", product_id),
        "unitPrice": unit_price,
        "quantity": quantity,
        "imageRef": format!("img/{}.jpg", product_id),
    })
}

pub fn address_json() -> Value {
    serde_json::json!({
        "name": "A Customer",
        "phone": "9999999999",
        "line1": "1 Test Lane",
        "city": "Pune",
        "state": "MH",
        "zip": "411001",
    })
}

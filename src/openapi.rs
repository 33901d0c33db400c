use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{coupon, order, order_item};
use crate::errors::ErrorResponse;
use crate::handlers::{checkout, orders};
use crate::services::{coupons::CouponOutcome, orders::OrderWithItems, pricing::CartLine};

/// OpenAPI documentation for the checkout and order API.
#[derive(OpenApi)]
#[openapi(
    paths(
        checkout::create_intent,
        checkout::verify_payment,
        checkout::place_cod_order,
        checkout::preview_coupon,
        orders::get_order,
        orders::list_orders,
        orders::update_order_status,
        orders::cancel_order,
    ),
    components(schemas(
        CartLine,
        CouponOutcome,
        OrderWithItems,
        ErrorResponse,
        checkout::CreateIntentRequest,
        checkout::CreateIntentResponse,
        checkout::VerifyPaymentRequest,
        checkout::OrderPlacedResponse,
        checkout::CodOrderRequest,
        checkout::CouponPreviewRequest,
        orders::UpdateStatusRequest,
        order::Model,
        order::OrderStatus,
        order::PaymentMethod,
        order::OrderAmounts,
        order::PaymentDetails,
        order::ShippingAddress,
        order_item::Model,
        coupon::CouponKind,
        coupon::CouponScope,
    )),
    tags(
        (name = "Checkout", description = "Cart pricing, payment intents, and order placement"),
        (name = "Orders", description = "Order retrieval and fulfillment transitions")
    ),
    info(
        title = "Storefront Checkout API",
        description = "Checkout and order settlement service"
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

// Checkout and settlement services
pub mod checkout;
pub mod coupons;
pub mod gateway;
pub mod orders;
pub mod pricing;

// Re-export services for convenience
pub use checkout::CheckoutService;
pub use coupons::{CouponService, CustomerContext};
pub use gateway::{HttpPaymentGateway, PaymentGateway};
pub use orders::OrderService;

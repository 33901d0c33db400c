pub mod checkout;
pub mod common;
pub mod orders;

pub use checkout::checkout_routes;
pub use orders::orders_routes;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A single cart line as submitted by the client. Owned transiently by the
/// session; persisted only once an order is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_label: Option<String>,
    pub image_ref: String,
    /// Catalog category, used for coupon scope checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Settled totals for a cart. `total` is rounded to whole currency units and
/// floored at 1 so the payment gateway never sees a zero-amount charge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Computes subtotal, shipping, and the final payable total.
///
/// Shipping is free strictly above `shipping_threshold`; the threshold and
/// fee are per-channel constants supplied by the caller. No mid-sum rounding:
/// only the final total is rounded (half away from zero, matching the
/// storefront's client-side arithmetic).
pub fn compute_totals(
    cart: &[CartLine],
    shipping_threshold: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
) -> CartTotals {
    let subtotal: Decimal = cart
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    let shipping = if subtotal > shipping_threshold {
        Decimal::ZERO
    } else {
        shipping_fee
    };

    let raw = subtotal + shipping - discount;
    let total = raw
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ONE);

    CartTotals {
        subtotal,
        shipping,
        discount,
        total,
    }
}

/// Converts a whole-unit total to integer minor units (scale 100) as the
/// payment provider requires.
pub fn to_minor_units(total: Decimal) -> i64 {
    (total * Decimal::from(100)).to_i64().unwrap_or(0)
}

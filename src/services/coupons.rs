use crate::{
    entities::coupon::{self, CouponKind, CouponScope, CouponStatus, Entity as Coupon},
    errors::ServiceError,
    services::pricing::CartLine,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Customer facts the resolver cannot derive itself (it has no access to
/// order history); the caller injects them.
#[derive(Debug, Clone, Default)]
pub struct CustomerContext {
    pub user_id: String,
    /// True when the customer has zero prior orders.
    pub is_new_customer: bool,
    /// True when the customer already redeemed this code.
    pub has_redeemed_code: bool,
}

/// Result of resolving a coupon against a cart. Free shipping is signalled
/// via its own field; `discount_amount` is only ever a subtotal deduction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponOutcome {
    pub applicable: bool,
    pub discount_amount: Decimal,
    pub free_shipping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip)]
    pub coupon_id: Option<Uuid>,
}

impl CouponOutcome {
    pub fn inapplicable(reason: impl Into<String>) -> Self {
        Self {
            applicable: false,
            discount_amount: Decimal::ZERO,
            free_shipping: false,
            reason: Some(reason.into()),
            code: None,
            coupon_id: None,
        }
    }
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds an active coupon by code. Lookup is case-insensitive; the
    /// canonical stored form is uppercase.
    pub async fn find_active(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        let canonical = code.trim().to_uppercase();
        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(canonical))
            .filter(coupon::Column::Status.eq(CouponStatus::Active))
            .one(&*self.db)
            .await?;
        Ok(found)
    }

    /// Resolves a coupon code against a cart. Never fails the checkout: any
    /// failed check yields `applicable: false` with a reason.
    pub async fn resolve(
        &self,
        code: &str,
        cart: &[CartLine],
        ctx: &CustomerContext,
    ) -> Result<CouponOutcome, ServiceError> {
        let Some(coupon) = self.find_active(code).await? else {
            debug!(code, "coupon not found or not active");
            return Ok(CouponOutcome::inapplicable("Coupon not found"));
        };

        Ok(validate_coupon(&coupon, cart, ctx, Utc::now()))
    }

    /// Records a redemption by bumping `used_count` under an optimistic
    /// version guard. The original storefront never incremented usage; this
    /// closes that gap explicitly. A lost race or exhausted limit is logged
    /// and reported, never retried here.
    pub async fn record_redemption(&self, coupon_id: Uuid) -> Result<(), ServiceError> {
        let Some(coupon) = Coupon::find_by_id(coupon_id).one(&*self.db).await? else {
            return Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon_id
            )));
        };

        if coupon.usage_limit > 0 && coupon.used_count >= coupon.usage_limit {
            return Err(ServiceError::InvalidOperation(format!(
                "Coupon {} usage limit reached",
                coupon.code
            )));
        }

        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(
                coupon::Column::Version,
                Expr::col(coupon::Column::Version).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(coupon::Column::Version.eq(coupon.version))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!(%coupon_id, "concurrent coupon redemption detected, increment skipped");
            return Err(ServiceError::InvalidOperation(format!(
                "Coupon {} was modified concurrently",
                coupon.code
            )));
        }

        Ok(())
    }
}

/// Runs every validity check and computes the discount. Pure: used both for
/// the server-side settlement path and the client-facing preview endpoint,
/// which keeps the two sides' arithmetic consistent by construction.
pub fn validate_coupon(
    coupon: &coupon::Model,
    cart: &[CartLine],
    ctx: &CustomerContext,
    now: DateTime<Utc>,
) -> CouponOutcome {
    if now < coupon.active_from {
        return CouponOutcome::inapplicable("Coupon is not active yet");
    }
    if let Some(until) = coupon.active_until {
        if now > until {
            return CouponOutcome::inapplicable("Coupon has expired");
        }
    }

    let subtotal: Decimal = cart
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    if subtotal < coupon.min_order_value {
        return CouponOutcome::inapplicable(format!(
            "Order value must be at least {}",
            coupon.min_order_value
        ));
    }

    if !scope_matches(&coupon.scope, cart) {
        return CouponOutcome::inapplicable("Coupon does not apply to any item in the cart");
    }

    if coupon.restrict_to_new_customers && !ctx.is_new_customer {
        return CouponOutcome::inapplicable("Coupon is only valid for new customers");
    }

    if coupon.usage_limit > 0 && coupon.used_count >= coupon.usage_limit {
        return CouponOutcome::inapplicable("Coupon usage limit reached");
    }

    if coupon.one_use_per_customer && ctx.has_redeemed_code {
        return CouponOutcome::inapplicable("Coupon already used by this customer");
    }

    let (discount_amount, free_shipping) = match coupon.kind {
        CouponKind::Percentage => (subtotal * coupon.value / Decimal::from(100), false),
        // Clamping against the payable floor happens in the pricing engine.
        CouponKind::Fixed => (coupon.value, false),
        CouponKind::FreeShipping => (Decimal::ZERO, true),
    };

    CouponOutcome {
        applicable: true,
        discount_amount,
        free_shipping,
        reason: None,
        code: Some(coupon.code.clone()),
        coupon_id: Some(coupon.id),
    }
}

fn scope_matches(scope: &CouponScope, cart: &[CartLine]) -> bool {
    match scope {
        CouponScope::All => true,
        CouponScope::Categories(categories) => cart.iter().any(|line| {
            line.category
                .as_ref()
                .is_some_and(|c| categories.iter().any(|t| t.eq_ignore_ascii_case(c)))
        }),
        CouponScope::Products(products) => cart
            .iter()
            .any(|line| products.iter().any(|p| p == &line.product_id)),
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Discount kind. The meaning of `value` depends on the kind: a percentage
/// of subtotal, a fixed amount, or a shipping-fee waiver (value ignored).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
    #[sea_orm(string_value = "free_shipping")]
    FreeShipping,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

/// Catalog subset a coupon applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(tag = "type", content = "targets", rename_all = "snake_case")]
pub enum CouponScope {
    All,
    Categories(Vec<String>),
    Products(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Canonical form is uppercase; lookups uppercase their input.
    #[sea_orm(unique)]
    pub code: String,

    pub kind: CouponKind,
    pub value: Decimal,
    pub min_order_value: Decimal,

    #[sea_orm(column_type = "Json")]
    pub scope: CouponScope,

    /// 0 = unlimited
    pub usage_limit: i32,
    pub used_count: i32,

    pub restrict_to_new_customers: bool,
    pub one_use_per_customer: bool,

    pub active_from: DateTime<Utc>,
    pub active_until: Option<DateTime<Utc>>,
    pub status: CouponStatus,

    /// Bumped on every redemption; guards the used_count increment against
    /// concurrent redemptions of a limited-use code.
    pub version: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

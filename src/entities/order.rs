use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fulfillment status of a placed order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "placed")]
    Placed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "cancellation_requested")]
    CancellationRequested,
}

/// How the order was paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Online,
}

/// Settled amounts for an order. The invariant
/// `total == round(subtotal + shipping - discount)` with `total >= 1` is
/// enforced by the pricing engine before a draft reaches persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct OrderAmounts {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Payment metadata. Field names are part of the persisted record layout
/// consumed by order-history and admin screens; do not rename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_payment_id: Option<String>,
    pub is_verified: bool,
}

/// Shipping destination. All fields required at order placement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: String,
    pub status: OrderStatus,

    #[sea_orm(column_type = "Json")]
    pub amounts: OrderAmounts,

    #[sea_orm(column_type = "Json")]
    pub shipping_address: ShippingAddress,

    #[sea_orm(column_type = "Json")]
    pub payment: PaymentDetails,

    pub applied_coupon_code: Option<String>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl OrderStatus {
    /// Legal fulfillment transitions. Checkout only ever creates `Placed`
    /// orders; everything else is downstream fulfillment.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Placed, OrderStatus::Shipped)
                | (OrderStatus::Placed, OrderStatus::Cancelled)
                | (OrderStatus::Placed, OrderStatus::CancellationRequested)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::CancellationRequested, OrderStatus::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placed_order_can_ship_or_cancel() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::CancellationRequested));
    }

    #[test]
    fn delivered_is_terminal() {
        for next in [
            OrderStatus::Placed,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
            OrderStatus::CancellationRequested,
        ] {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
        }
    }

    #[test]
    fn payment_details_serialize_with_wire_field_names() {
        let payment = PaymentDetails {
            method: PaymentMethod::Online,
            provider_intent_id: Some("order_abc".to_string()),
            provider_payment_id: Some("pay_123".to_string()),
            is_verified: true,
        };

        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["method"], "online");
        assert_eq!(json["providerIntentId"], "order_abc");
        assert_eq!(json["providerPaymentId"], "pay_123");
        assert_eq!(json["isVerified"], true);
    }
}

use crate::{
    entities::{
        order::{self, Entity as Order, OrderAmounts, OrderStatus, PaymentDetails, ShippingAddress},
        order_item::{self, Entity as OrderItem},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::CartLine,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Everything needed to persist a finalized order. Built by the checkout
/// orchestrator after pricing and (for online payments) verification.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub address: ShippingAddress,
    pub amounts: OrderAmounts,
    pub applied_coupon_code: Option<String>,
    pub currency: String,
    pub payment: PaymentDetails,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Persists a finalized order as a single transactional append: one
    /// order row plus its item rows. Each checkout produces a brand-new
    /// record, so no read-modify-write race exists here. Stock levels are
    /// deliberately not adjusted.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id))]
    pub async fn create_order(&self, draft: OrderDraft) -> Result<order::Model, ServiceError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(draft.user_id),
            status: Set(OrderStatus::Placed),
            amounts: Set(draft.amounts),
            shipping_address: Set(draft.address),
            payment: Set(draft.payment),
            applied_coupon_code: Set(draft.applied_coupon_code),
            currency: Set(draft.currency),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let inserted = order_model
            .insert(&txn)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        for line in &draft.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id.clone()),
                name: Set(line.name.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                variant_label: Set(line.variant_label.clone()),
                image_ref: Set(line.image_ref.clone()),
            };
            item.insert(&txn)
                .await
                .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        self.event_sender.send(Event::OrderCreated(order_id)).await;
        info!(%order_id, "order persisted");

        Ok(inserted)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    pub async fn list_orders_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// Applies a fulfillment status transition, rejecting illegal ones.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot transition order from {:?} to {:?}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status),
                new_status: format!("{:?}", new_status),
            })
            .await;

        Ok(updated)
    }

    /// Customer-initiated cancellation: a placed order moves to
    /// `cancellation_requested` and waits for fulfillment to confirm.
    pub async fn request_cancellation(
        &self,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let updated = self
            .update_status(order_id, OrderStatus::CancellationRequested)
            .await?;

        self.event_sender
            .send(Event::OrderCancellationRequested(order_id))
            .await;

        Ok(updated)
    }
}

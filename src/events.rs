use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout and order flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancellationRequested(Uuid),

    // Payment events
    PaymentIntentCreated {
        provider_intent_id: String,
        amount_minor: i64,
        currency: String,
    },
    PaymentVerified {
        provider_intent_id: String,
        provider_payment_id: String,
    },
    PaymentVerificationFailed {
        provider_intent_id: String,
    },

    // Coupon events
    CouponApplied {
        code: String,
        discount: Decimal,
    },
    CouponRejected {
        code: String,
        reason: String,
    },
    CouponRedemptionRecorded {
        coupon_id: Uuid,
        code: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; delivery is best-effort and never fails the caller's
    /// request path.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to enqueue event: {}", e);
        }
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Consumes events and logs them for operator visibility. Downstream
/// integrations (webhooks, analytics) would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::OrderCancellationRequested(order_id) => {
                info!(%order_id, "order cancellation requested");
            }
            Event::PaymentIntentCreated {
                provider_intent_id,
                amount_minor,
                currency,
            } => {
                info!(%provider_intent_id, %amount_minor, %currency, "payment intent created");
            }
            Event::PaymentVerified {
                provider_intent_id,
                provider_payment_id,
            } => {
                info!(%provider_intent_id, %provider_payment_id, "payment verified");
            }
            Event::PaymentVerificationFailed { provider_intent_id } => {
                warn!(%provider_intent_id, "payment verification failed");
            }
            Event::CouponApplied { code, discount } => {
                info!(%code, %discount, "coupon applied");
            }
            Event::CouponRejected { code, reason } => {
                info!(%code, %reason, "coupon rejected");
            }
            Event::CouponRedemptionRecorded { coupon_id, code } => {
                info!(%coupon_id, %code, "coupon redemption recorded");
            }
        }
    }
}

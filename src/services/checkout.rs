use crate::{
    config::ShippingConfig,
    entities::order::{self, OrderAmounts, PaymentDetails, PaymentMethod, ShippingAddress},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        coupons::{CouponOutcome, CouponService, CustomerContext},
        gateway::{verify_payment_signature, PaymentGateway},
        orders::{OrderDraft, OrderService},
        pricing::{self, CartLine, CartTotals},
    },
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Progress of a single checkout attempt.
///
/// `AwaitingProviderCallback` is a suspension point: the provider's widget
/// talks to the user directly and the server only sees the attempt again at
/// the verify endpoint. An abandoned attempt simply never leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Validating,
    AwaitingIntent,
    AwaitingProviderCallback,
    Verifying,
    Placing,
    Placed,
    Failed,
}

impl CheckoutState {
    pub fn can_transition_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Placing)          // cash on delivery
                | (Validating, AwaitingIntent)   // online
                | (Validating, Failed)
                | (AwaitingIntent, AwaitingProviderCallback)
                | (AwaitingIntent, Failed)
                | (AwaitingProviderCallback, Verifying)
                | (Verifying, Placing)
                | (Verifying, Failed)
                | (Placing, Placed)
                | (Placing, Failed)
        )
    }
}

/// Quote returned after intent creation; the client hands the intent id to
/// the provider widget and comes back through the verify endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IntentQuote {
    pub provider_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub discount_amount: Decimal,
}

/// Data the provider callback delivers after the user completes payment.
#[derive(Debug, Clone)]
pub struct PaymentCallback {
    pub provider_intent_id: String,
    pub provider_payment_id: String,
    pub signature: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    coupons: Arc<CouponService>,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    shipping: ShippingConfig,
    currency: String,
    /// Shared secret for callback signature verification. Never logged.
    callback_secret: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coupons: Arc<CouponService>,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        shipping: ShippingConfig,
        currency: String,
        callback_secret: String,
    ) -> Self {
        Self {
            coupons,
            orders,
            gateway,
            event_sender,
            shipping,
            currency,
            callback_secret,
        }
    }

    /// Prices the cart and creates a provider intent. First half of the
    /// online flow; the attempt then suspends until the provider callback.
    #[instrument(skip(self, cart, customer), fields(lines = cart.len()))]
    pub async fn begin_online_checkout(
        &self,
        cart: &[CartLine],
        coupon_code: Option<&str>,
        customer: &CustomerContext,
    ) -> Result<IntentQuote, ServiceError> {
        let mut state = self.advance(CheckoutState::Idle, CheckoutState::Validating);
        self.validate_cart(cart)?;

        let (totals, _outcome) = self.price_cart(cart, coupon_code, customer).await?;

        state = self.advance(state, CheckoutState::AwaitingIntent);
        let amount_minor = pricing::to_minor_units(totals.total);
        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());

        let intent = self
            .gateway
            .create_intent(amount_minor, &self.currency, &receipt)
            .await
            .map_err(|e| {
                self.note_failure(state, "intent creation failed");
                e
            })?;

        self.advance(state, CheckoutState::AwaitingProviderCallback);
        self.event_sender
            .send(Event::PaymentIntentCreated {
                provider_intent_id: intent.provider_intent_id.clone(),
                amount_minor: intent.amount_minor,
                currency: intent.currency.clone(),
            })
            .await;

        Ok(IntentQuote {
            provider_intent_id: intent.provider_intent_id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            discount_amount: totals.discount,
        })
    }

    /// Second half of the online flow: verify the provider callback, then
    /// persist the order exactly once. Verification failure is fatal and
    /// writes nothing.
    #[instrument(skip_all, fields(provider_intent_id = %callback.provider_intent_id))]
    pub async fn confirm_online_order(
        &self,
        callback: &PaymentCallback,
        cart: &[CartLine],
        address: &ShippingAddress,
        customer: &CustomerContext,
        coupon_code: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let state = self.advance(
            CheckoutState::AwaitingProviderCallback,
            CheckoutState::Verifying,
        );
        self.validate_cart(cart)?;
        validate_address(address)?;

        let verified = verify_payment_signature(
            &callback.provider_intent_id,
            &callback.provider_payment_id,
            &callback.signature,
            &self.callback_secret,
        );
        if !verified {
            self.note_failure(state, "signature mismatch");
            self.event_sender
                .send(Event::PaymentVerificationFailed {
                    provider_intent_id: callback.provider_intent_id.clone(),
                })
                .await;
            return Err(ServiceError::InvalidSignature);
        }

        self.event_sender
            .send(Event::PaymentVerified {
                provider_intent_id: callback.provider_intent_id.clone(),
                provider_payment_id: callback.provider_payment_id.clone(),
            })
            .await;

        let payment = PaymentDetails {
            method: PaymentMethod::Online,
            provider_intent_id: Some(callback.provider_intent_id.clone()),
            provider_payment_id: Some(callback.provider_payment_id.clone()),
            is_verified: true,
        };

        self.place(state, cart, address, customer, coupon_code, payment)
            .await
    }

    /// Cash-on-delivery path: no intent, no verification, immediate write.
    #[instrument(skip_all, fields(user_id = %customer.user_id))]
    pub async fn place_cod_order(
        &self,
        cart: &[CartLine],
        address: &ShippingAddress,
        customer: &CustomerContext,
        coupon_code: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let state = self.advance(CheckoutState::Idle, CheckoutState::Validating);
        self.validate_cart(cart)?;
        validate_address(address)?;

        let payment = PaymentDetails {
            method: PaymentMethod::Cod,
            provider_intent_id: None,
            provider_payment_id: None,
            is_verified: false,
        };

        self.place(state, cart, address, customer, coupon_code, payment)
            .await
    }

    /// Client-facing discount preview; runs the same resolver the settlement
    /// paths use, so both sides always agree on the arithmetic.
    pub async fn preview_coupon(
        &self,
        code: &str,
        cart: &[CartLine],
        customer: &CustomerContext,
    ) -> Result<CouponOutcome, ServiceError> {
        self.validate_cart(cart)?;
        self.coupons.resolve(code, cart, customer).await
    }

    async fn place(
        &self,
        state: CheckoutState,
        cart: &[CartLine],
        address: &ShippingAddress,
        customer: &CustomerContext,
        coupon_code: Option<&str>,
        payment: PaymentDetails,
    ) -> Result<order::Model, ServiceError> {
        let (totals, outcome) = self.price_cart(cart, coupon_code, customer).await?;

        let state = self.advance(state, CheckoutState::Placing);
        let draft = OrderDraft {
            user_id: customer.user_id.clone(),
            items: cart.to_vec(),
            address: address.clone(),
            amounts: OrderAmounts {
                subtotal: totals.subtotal,
                shipping: totals.shipping,
                discount: totals.discount,
                total: totals.total,
            },
            applied_coupon_code: outcome.as_ref().and_then(|o| o.code.clone()),
            currency: self.currency.clone(),
            payment,
        };

        let order = self.orders.create_order(draft).await.map_err(|e| {
            self.note_failure(state, "order write failed");
            e
        })?;

        self.advance(state, CheckoutState::Placed);

        // Usage recording is best-effort: a lost optimistic race must not
        // unwind an already-placed order.
        if let Some(outcome) = outcome {
            if let (Some(coupon_id), Some(code)) = (outcome.coupon_id, outcome.code) {
                match self.coupons.record_redemption(coupon_id).await {
                    Ok(()) => {
                        self.event_sender
                            .send(Event::CouponRedemptionRecorded { coupon_id, code })
                            .await;
                    }
                    Err(e) => warn!(%coupon_id, "failed to record coupon redemption: {}", e),
                }
            }
        }

        info!(order_id = %order.id, "checkout placed order");
        Ok(order)
    }

    /// Resolves the coupon (non-fatally) and computes settled totals. A
    /// failed coupon degrades to zero discount rather than aborting.
    async fn price_cart(
        &self,
        cart: &[CartLine],
        coupon_code: Option<&str>,
        customer: &CustomerContext,
    ) -> Result<(CartTotals, Option<CouponOutcome>), ServiceError> {
        let outcome = match coupon_code {
            Some(code) if !code.trim().is_empty() => {
                let outcome = self.coupons.resolve(code, cart, customer).await?;
                if outcome.applicable {
                    self.event_sender
                        .send(Event::CouponApplied {
                            code: outcome.code.clone().unwrap_or_default(),
                            discount: outcome.discount_amount,
                        })
                        .await;
                    Some(outcome)
                } else {
                    self.event_sender
                        .send(Event::CouponRejected {
                            code: code.to_uppercase(),
                            reason: outcome
                                .reason
                                .clone()
                                .unwrap_or_else(|| "not applicable".to_string()),
                        })
                        .await;
                    None
                }
            }
            _ => None,
        };

        let (discount, shipping_fee) = match &outcome {
            Some(o) if o.free_shipping => (Decimal::ZERO, Decimal::ZERO),
            Some(o) => (o.discount_amount, self.shipping.shipping_fee),
            None => (Decimal::ZERO, self.shipping.shipping_fee),
        };

        let totals = pricing::compute_totals(
            cart,
            self.shipping.free_shipping_threshold,
            shipping_fee,
            discount,
        );

        Ok((totals, outcome))
    }

    fn validate_cart(&self, cart: &[CartLine]) -> Result<(), ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::Validation("Cart is empty".to_string()));
        }
        for line in cart {
            if line.quantity <= 0 {
                return Err(ServiceError::Validation(format!(
                    "Invalid quantity for product {}",
                    line.product_id
                )));
            }
            if line.unit_price <= Decimal::ZERO {
                return Err(ServiceError::Validation(format!(
                    "Invalid price for product {}",
                    line.product_id
                )));
            }
        }
        Ok(())
    }

    fn advance(&self, from: CheckoutState, to: CheckoutState) -> CheckoutState {
        debug_assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
        debug!(?from, ?to, "checkout state transition");
        to
    }

    fn note_failure(&self, from: CheckoutState, reason: &str) {
        debug_assert!(from.can_transition_to(CheckoutState::Failed));
        debug!(?from, reason, "checkout attempt failed");
    }
}

/// All address fields are required for placement; presence is the only check.
pub fn validate_address(address: &ShippingAddress) -> Result<(), ServiceError> {
    let fields = [
        ("name", &address.name),
        ("phone", &address.phone),
        ("line1", &address.line1),
        ("city", &address.city),
        ("state", &address.state),
        ("zip", &address.zip),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing address field: {}",
                field
            )));
        }
    }
    Ok(())
}

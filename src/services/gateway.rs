use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// A provider-side payment intent awaiting capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub provider_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Payment provider seam. One implementation talks to the real provider;
/// tests substitute their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Requests a new intent for the given amount in minor currency units.
    /// The receipt is an opaque caller-supplied hint; the provider is not
    /// assumed to deduplicate on it, so every call yields a fresh intent.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError>;
}

#[derive(Serialize)]
struct CreateIntentRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct CreateIntentResponse {
    id: String,
    amount: i64,
    currency: String,
}

/// HTTP client for the payment provider's REST API, authenticated with the
/// configured key pair.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(
        api_base: String,
        key_id: String,
        key_secret: String,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("http client init failed: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, receipt))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/orders", self.api_base);
        let body = CreateIntentRequest {
            amount: amount_minor,
            currency,
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("payment provider unreachable: {}", e);
                ServiceError::PaymentUpstream(format!("provider request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "payment provider rejected intent request");
            return Err(ServiceError::PaymentUpstream(format!(
                "provider returned {}",
                status
            )));
        }

        let parsed: CreateIntentResponse = response.json().await.map_err(|e| {
            ServiceError::PaymentUpstream(format!("invalid provider response: {}", e))
        })?;

        info!(provider_intent_id = %parsed.id, "payment intent created");

        Ok(PaymentIntent {
            provider_intent_id: parsed.id,
            amount_minor: parsed.amount,
            currency: parsed.currency,
        })
    }
}

/// Recomputes the callback HMAC and compares it to the supplied signature.
///
/// The signed message is `<intent_id>|<payment_id>`; the signature is the
/// hex-encoded HMAC-SHA256 under the shared key secret. Comparison is
/// constant-time.
pub fn verify_payment_signature(
    provider_intent_id: &str,
    provider_payment_id: &str,
    supplied_signature: &str,
    shared_secret: &str,
) -> bool {
    let message = format!("{}|{}", provider_intent_id, provider_payment_id);
    let mut mac = match HmacSha256::new_from_slice(shared_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, supplied_signature)
}

/// Computes the signature a legitimate provider callback would carry. Used
/// by tests; exposed so operator tooling can reproduce signatures.
pub fn sign_payment(
    provider_intent_id: &str,
    provider_payment_id: &str,
    shared_secret: &str,
) -> String {
    let message = format!("{}|{}", provider_intent_id, provider_payment_id);
    let mut mac =
        HmacSha256::new_from_slice(shared_secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

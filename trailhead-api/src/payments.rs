//! Payment processor integration: hosted checkout sessions and signed
//! webhooks. Thin wrapper over the processor's HTTP API; no payment logic
//! lives here.

use serde::{Deserialize, Serialize};

use crate::config::PaymentsConfig;
use crate::error::{Error, Result};
use crate::models::{Tour, User};

/// Header carrying the webhook signature: `t=<unix>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "webhook-signature";

/// Domain-separation context for the webhook MAC key.
const WEBHOOK_KEY_CONTEXT: &str = "trailhead payments webhook v1";

/// Hosted checkout session as returned by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Total in the currency's minor unit (cents).
    #[serde(default)]
    pub amount_total: Option<i64>,
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: CheckoutSession,
}

/// The event kind that confirms payment and triggers booking creation.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    config: PaymentsConfig,
}

impl PaymentClient {
    pub fn new(config: PaymentsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Request a hosted checkout session for one seat on a tour at its
    /// current price. The tour id rides along as opaque reference data; the
    /// webhook hands it back when payment completes.
    pub async fn create_checkout_session(
        &self,
        user: &User,
        tour: &Tour,
        public_url: &str,
    ) -> Result<CheckoutSession> {
        let amount_cents = ((tour.price * 100.0).round() as i64).to_string();
        let success_url = format!("{public_url}/my-tours?alert=booking");
        let cancel_url = format!("{public_url}/tour/{}", tour.slug);
        let product_name = format!("{} Tour", tour.name);
        let tour_id = tour.id.to_hex();

        let params = [
            ("mode", "payment"),
            ("success_url", success_url.as_str()),
            ("cancel_url", cancel_url.as_str()),
            ("customer_email", user.email.as_str()),
            ("client_reference_id", tour_id.as_str()),
            ("line_items[0][quantity]", "1"),
            (
                "line_items[0][price_data][currency]",
                self.config.currency.as_str(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount_cents.as_str(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                product_name.as_str(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                tour.summary.as_str(),
            ),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::External(format!(
                "checkout session creation failed with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Verify the webhook signature header against the configured secret,
    /// then parse the payload.
    pub fn parse_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        verify_signature(payload, signature_header, &self.config.webhook_secret)?;
        serde_json::from_slice(payload)
            .map_err(|e| Error::BadRequest(format!("Malformed webhook payload: {e}")))
    }
}

fn webhook_mac(secret: &str, timestamp: i64, payload: &[u8]) -> blake3::Hash {
    let key = blake3::derive_key(WEBHOOK_KEY_CONTEXT, secret.as_bytes());
    let mut hasher = blake3::Hasher::new_keyed(&key);
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b".");
    hasher.update(payload);
    hasher.finalize()
}

/// Produce the signature header value for a payload. The webhook sender side
/// of the contract; used directly by tests.
pub fn sign_payload(payload: &[u8], timestamp: i64, secret: &str) -> String {
    let mac = webhook_mac(secret, timestamp, payload);
    format!("t={timestamp},v1={}", mac.to_hex())
}

/// Validate a `t=...,v1=...` signature header. Comparison of the MAC is
/// constant-time.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<()> {
    let (timestamp, supplied) = parse_signature_header(header)?;
    let supplied = blake3::Hash::from_hex(supplied)
        .map_err(|_| Error::BadRequest("Webhook signature verification failed".to_string()))?;

    if webhook_mac(secret, timestamp, payload) != supplied {
        return Err(Error::BadRequest(
            "Webhook signature verification failed".to_string(),
        ));
    }
    Ok(())
}

fn parse_signature_header(header: &str) -> Result<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) => Ok((t, s)),
        _ => Err(Error::BadRequest(
            "Malformed webhook signature header".to_string(),
        )),
    }
}

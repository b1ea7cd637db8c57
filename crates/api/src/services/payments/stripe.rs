//! Stripe Checkout.
//!
//! A Checkout Session is created per order with the order id in
//! `client_reference_id` and `metadata[order_id]`. Stripe then calls the
//! webhook with `checkout.session.completed`, signed in the `Stripe-Signature`
//! header as `t=<unix>,v1=<hex hmac>` over `"{t}.{body}"`.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use pasal_core::OrderId;

use super::{PaymentError, constant_time_compare, hmac_sha256};
use crate::config::StripeConfig;

/// Stripe REST API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook signature timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// One line on the hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutLine<'a> {
    pub name: &'a str,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: i32,
}

/// Everything Stripe needs to render a checkout page for an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub order_id: OrderId,
    pub lines: Vec<CheckoutLine<'a>>,
    pub customer_email: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created Checkout Session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The parts of a Checkout Session object the webhook reads.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionObject {
    /// The order this session pays for, from metadata or the client reference.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get("order_id")
            .or(self.client_reference_id.as_ref())
            .and_then(|s| s.parse::<i32>().ok())
            .map(OrderId::new)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
    currency: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &StripeConfig) -> Self {
        Self {
            client,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Create a hosted Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` on transport failure and
    /// `PaymentError::Api` if Stripe rejects the session.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = checkout_form(&self.currency, request);

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(PaymentError::Api(message));
        }

        let session: CheckoutSession = serde_json::from_str(&body)
            .map_err(|e| PaymentError::Api(format!("unexpected checkout response: {e}")))?;
        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }

    /// Verify a webhook delivery and parse its event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the header doesn't verify and
    /// `PaymentError::InvalidPayload` if the body isn't an event.
    pub fn verify_webhook(
        &self,
        signature_header: &str,
        payload: &[u8],
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            self.webhook_secret.expose_secret(),
            signature_header,
            payload,
            chrono::Utc::now().timestamp(),
        )?;

        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}

/// Form-encoded Checkout Session parameters.
fn checkout_form(currency: &str, request: &CheckoutRequest<'_>) -> Vec<(String, String)> {
    let order_id = request.order_id.to_string();
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), order_id.clone()),
        ("customer_email".to_string(), request.customer_email.to_string()),
        ("metadata[order_id]".to_string(), order_id),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    form
}

/// Check a `Stripe-Signature` header against `payload` at time `now`.
///
/// Any `v1` entry may match, which lets Stripe roll secrets.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed, the
/// timestamp is outside the tolerance, or no signature matches.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("invalid timestamp".to_string()))?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    let expected = hex::encode(hmac_sha256(secret.as_bytes(), &signed)?);

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;

    fn sign(timestamp: i64, payload: &str) -> String {
        let message = format!("{timestamp}.{payload}");
        hex::encode(hmac_sha256(SECRET.as_bytes(), message.as_bytes()).unwrap())
    }

    #[test]
    fn test_valid_signature() {
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = format!("t={NOW},v1={}", sign(NOW, payload));
        assert!(verify_signature(SECRET, &header, payload.as_bytes(), NOW + 10).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = "{}";
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={}", sign(NOW, payload));
        assert!(verify_signature(SECRET, &header, payload.as_bytes(), NOW).is_ok());
    }

    #[test]
    fn test_tampered_payload() {
        let header = format!("t={NOW},v1={}", sign(NOW, r#"{"amount":100}"#));
        let result = verify_signature(SECRET, &header, br#"{"amount":1}"#, NOW);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp() {
        let payload = "{}";
        let header = format!("t={NOW},v1={}", sign(NOW, payload));
        let result = verify_signature(
            SECRET,
            &header,
            payload.as_bytes(),
            NOW + SIGNATURE_TOLERANCE_SECS + 1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_header() {
        assert!(verify_signature(SECRET, "garbage", b"{}", NOW).is_err());
        assert!(verify_signature(SECRET, &format!("t={NOW}"), b"{}", NOW).is_err());
        assert!(verify_signature(SECRET, "t=abc,v1=00", b"{}", NOW).is_err());
    }

    #[test]
    fn test_checkout_form() {
        let request = CheckoutRequest {
            order_id: OrderId::new(17),
            lines: vec![
                CheckoutLine {
                    name: "Pashmina Shawl",
                    unit_amount: 4599,
                    quantity: 2,
                },
                CheckoutLine {
                    name: "Prayer Flags",
                    unit_amount: 850,
                    quantity: 1,
                },
            ],
            customer_email: "sita@example.com",
            success_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel".to_string(),
        };

        let form: HashMap<String, String> = checkout_form("usd", &request).into_iter().collect();
        assert_eq!(form["mode"], "payment");
        assert_eq!(form["metadata[order_id]"], "17");
        assert_eq!(form["client_reference_id"], "17");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "4599");
        assert_eq!(form["line_items[0][quantity]"], "2");
        assert_eq!(form["line_items[1][price_data][product_data][name]"], "Prayer Flags");
        assert_eq!(form["line_items[1][price_data][currency]"], "usd");
    }

    #[test]
    fn test_session_order_id() {
        let session: SessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "metadata": {"order_id": "23"}
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some(OrderId::new(23)));

        let session: SessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_2",
            "client_reference_id": "5"
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some(OrderId::new(5)));
    }
}

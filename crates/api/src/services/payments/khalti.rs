//! Khalti ePayment.
//!
//! The server initiates a payment and gets back a `pidx` and a hosted payment
//! URL. After the customer returns, the `pidx` is looked up server-to-server;
//! the lookup is the only source of truth for the outcome.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::PaymentError;
use crate::config::KhaltiConfig;

/// Parameters for a new Khalti payment.
#[derive(Debug, Clone, Serialize)]
pub struct KhaltiInitiateRequest<'a> {
    pub return_url: &'a str,
    pub website_url: &'a str,
    /// Amount in paisa.
    pub amount: i64,
    pub purchase_order_id: &'a str,
    pub purchase_order_name: &'a str,
}

/// Response to a successful initiate call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiInitiation {
    pub pidx: String,
    pub payment_url: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Response to a lookup call.
#[derive(Debug, Clone, Deserialize)]
pub struct KhaltiLookup {
    pub pidx: String,
    /// Amount in paisa.
    pub total_amount: i64,
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub refunded: bool,
}

/// What a lookup status means for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Completed,
    Failed,
    Pending,
}

impl KhaltiLookup {
    #[must_use]
    pub fn outcome(&self) -> LookupOutcome {
        match self.status.as_str() {
            "Completed" if !self.refunded => LookupOutcome::Completed,
            "Expired" | "User canceled" | "Refunded" | "Partially Refunded" => {
                LookupOutcome::Failed
            }
            "Completed" => LookupOutcome::Failed,
            _ => LookupOutcome::Pending,
        }
    }
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    pidx: &'a str,
}

/// Khalti API client.
#[derive(Clone)]
pub struct KhaltiClient {
    client: reqwest::Client,
    secret_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for KhaltiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KhaltiClient")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KhaltiClient {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &KhaltiConfig) -> Self {
        Self {
            client,
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    /// Start a payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` on transport failure and
    /// `PaymentError::Api` if Khalti rejects the request.
    #[instrument(skip(self, request), fields(order = %request.purchase_order_id))]
    pub async fn initiate(
        &self,
        request: &KhaltiInitiateRequest<'_>,
    ) -> Result<KhaltiInitiation, PaymentError> {
        let initiation: KhaltiInitiation = self.post("epayment/initiate/", request).await?;
        debug!(pidx = %initiation.pidx, "Khalti payment initiated");
        Ok(initiation)
    }

    /// Look up the state of a payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` on transport failure and
    /// `PaymentError::Api` if Khalti rejects the request.
    #[instrument(skip(self))]
    pub async fn lookup(&self, pidx: &str) -> Result<KhaltiLookup, PaymentError> {
        self.post("epayment/lookup/", &LookupRequest { pidx }).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PaymentError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Key {}", self.secret_key.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PaymentError::Api(error_message(&text, status)));
        }

        serde_json::from_str(&text)
            .map_err(|e| PaymentError::Api(format!("unexpected Khalti response: {e}")))
    }
}

/// Khalti errors come as `{"detail": "..."}` or as field-keyed arrays.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return format!("HTTP {status}");
    };

    if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
        return detail.to_string();
    }

    value
        .as_object()
        .and_then(|fields| {
            fields.iter().find_map(|(key, v)| {
                v.as_array()
                    .and_then(|a| a.first())
                    .and_then(|m| m.as_str())
                    .map(|m| format!("{key}: {m}"))
            })
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lookup(status: &str, refunded: bool) -> KhaltiLookup {
        KhaltiLookup {
            pidx: "bZQLD9wRVWo4CdESSfuSsB".to_string(),
            total_amount: 150_000,
            status: status.to_string(),
            transaction_id: None,
            fee: 0,
            refunded,
        }
    }

    #[test]
    fn test_lookup_outcomes() {
        assert_eq!(lookup("Completed", false).outcome(), LookupOutcome::Completed);
        assert_eq!(lookup("Completed", true).outcome(), LookupOutcome::Failed);
        assert_eq!(lookup("Expired", false).outcome(), LookupOutcome::Failed);
        assert_eq!(lookup("User canceled", false).outcome(), LookupOutcome::Failed);
        assert_eq!(lookup("Pending", false).outcome(), LookupOutcome::Pending);
        assert_eq!(lookup("Initiated", false).outcome(), LookupOutcome::Pending);
    }

    #[test]
    fn test_parse_lookup_response() {
        let body = r#"{
            "pidx": "HT6o6PEZRWFJ5ygavzHWd5",
            "total_amount": 1000,
            "status": "Completed",
            "transaction_id": "GFq9PFS7b2iYvL8Lir9oXe",
            "fee": 0,
            "refunded": false
        }"#;
        let parsed: KhaltiLookup = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_amount, 1000);
        assert_eq!(parsed.outcome(), LookupOutcome::Completed);
        assert_eq!(parsed.transaction_id.as_deref(), Some("GFq9PFS7b2iYvL8Lir9oXe"));
    }

    #[test]
    fn test_parse_lookup_with_null_transaction() {
        let body = r#"{"pidx":"x","total_amount":1000,"status":"Expired","transaction_id":null,"fee":0,"refunded":false}"#;
        let parsed: KhaltiLookup = serde_json::from_str(body).unwrap();
        assert!(parsed.transaction_id.is_none());
        assert_eq!(parsed.outcome(), LookupOutcome::Failed);
    }

    #[test]
    fn test_initiate_request_body() {
        let request = KhaltiInitiateRequest {
            return_url: "http://localhost:3000/payment/khalti",
            website_url: "http://localhost:3000",
            amount: 150_000,
            purchase_order_id: "42",
            purchase_order_name: "Order #42",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], 150_000);
        assert_eq!(json["purchase_order_id"], "42");
    }

    #[test]
    fn test_error_message_shapes() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(r#"{"detail":"Invalid token."}"#, status),
            "Invalid token."
        );
        assert_eq!(
            error_message(r#"{"amount":["Amount should be greater than Rs. 10"]}"#, status),
            "amount: Amount should be greater than Rs. 10"
        );
        assert_eq!(error_message("<html>", status), "HTTP 400 Bad Request");
    }
}

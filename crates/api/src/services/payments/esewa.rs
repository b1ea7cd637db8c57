//! eSewa ePay v2.
//!
//! The browser POSTs a signed form to eSewa. On success eSewa redirects back
//! with `?data=<base64 json>`; the JSON carries its own HMAC-SHA256 signature
//! over the fields listed in `signed_field_names`.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};

use pasal_core::Money;

use super::{PaymentError, constant_time_compare, hmac_sha256};
use crate::config::EsewaConfig;

/// Fields signed on the outgoing form, in order.
const SIGNED_FIELD_NAMES: &str = "total_amount,transaction_uuid,product_code";

/// Status eSewa reports for a settled payment.
const STATUS_COMPLETE: &str = "COMPLETE";

/// Form the storefront posts to eSewa.
#[derive(Debug, Clone, Serialize)]
pub struct EsewaForm {
    pub form_url: String,
    pub fields: EsewaFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct EsewaFields {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

/// A verified return payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsewaCallback {
    pub transaction_code: String,
    pub status: String,
    pub total_amount: Decimal,
    pub transaction_uuid: String,
    pub product_code: String,
}

impl EsewaCallback {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }
}

/// eSewa signer and verifier. Makes no HTTP calls.
#[derive(Clone)]
pub struct EsewaClient {
    merchant_code: String,
    secret_key: SecretString,
    form_url: String,
}

impl std::fmt::Debug for EsewaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsewaClient")
            .field("merchant_code", &self.merchant_code)
            .field("secret_key", &"[REDACTED]")
            .field("form_url", &self.form_url)
            .finish()
    }
}

impl EsewaClient {
    #[must_use]
    pub fn new(config: &EsewaConfig) -> Self {
        Self {
            merchant_code: config.merchant_code.clone(),
            secret_key: config.secret_key.clone(),
            form_url: config.form_url.clone(),
        }
    }

    /// Build the signed payment form for `total`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the key cannot be used for HMAC.
    pub fn payment_form(
        &self,
        total: Money,
        transaction_uuid: &str,
        success_url: String,
        failure_url: String,
    ) -> Result<EsewaForm, PaymentError> {
        let total_amount = total.to_string();
        let message = format!(
            "total_amount={total_amount},transaction_uuid={transaction_uuid},product_code={}",
            self.merchant_code
        );
        let signature = self.sign(&message)?;

        Ok(EsewaForm {
            form_url: self.form_url.clone(),
            fields: EsewaFields {
                amount: total_amount.clone(),
                tax_amount: "0".to_string(),
                total_amount,
                transaction_uuid: transaction_uuid.to_string(),
                product_code: self.merchant_code.clone(),
                product_service_charge: "0".to_string(),
                product_delivery_charge: "0".to_string(),
                success_url,
                failure_url,
                signed_field_names: SIGNED_FIELD_NAMES.to_string(),
                signature,
            },
        })
    }

    /// Base64 HMAC-SHA256 of `message`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the key cannot be used for HMAC.
    pub fn sign(&self, message: &str) -> Result<String, PaymentError> {
        let mac = hmac_sha256(self.secret_key.expose_secret().as_bytes(), message.as_bytes())?;
        Ok(STANDARD.encode(mac))
    }

    /// Decode and verify the `data` query parameter eSewa returns with.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidPayload` if the data cannot be decoded or
    /// lacks required fields, and `PaymentError::InvalidSignature` if the
    /// signature or merchant code does not match.
    pub fn verify_callback(&self, data: &str) -> Result<EsewaCallback, PaymentError> {
        // Query decoding turns '+' into ' '.
        let data = data.trim().replace(' ', "+");
        let bytes = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| PaymentError::InvalidPayload(format!("invalid base64: {e}")))?;
        let fields: Map<String, Value> = serde_json::from_slice(&bytes)
            .map_err(|e| PaymentError::InvalidPayload(format!("invalid json: {e}")))?;

        let signed_names = field(&fields, "signed_field_names")?;
        let message = signed_names
            .split(',')
            .map(|name| {
                let name = name.trim();
                field(&fields, name).map(|value| format!("{name}={value}"))
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(",");

        let expected = self.sign(&message)?;
        let signature = field(&fields, "signature")?;
        if !constant_time_compare(&expected, &signature) {
            return Err(PaymentError::InvalidSignature(
                "signature mismatch".to_string(),
            ));
        }

        let product_code = field(&fields, "product_code")?;
        if product_code != self.merchant_code {
            return Err(PaymentError::InvalidSignature(
                "product code does not match merchant".to_string(),
            ));
        }

        let raw_amount = field(&fields, "total_amount")?;
        let total_amount = Decimal::from_str(&raw_amount.replace(',', ""))
            .map_err(|_| PaymentError::InvalidPayload(format!("invalid amount {raw_amount}")))?;

        Ok(EsewaCallback {
            transaction_code: field(&fields, "transaction_code").unwrap_or_default(),
            status: field(&fields, "status")?,
            total_amount,
            transaction_uuid: field(&fields, "transaction_uuid")?,
            product_code,
        })
    }
}

/// A payload field as the string eSewa signed. Numbers are rendered as-is.
fn field(fields: &Map<String, Value>, name: &str) -> Result<String, PaymentError> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(PaymentError::InvalidPayload(format!("missing field {name}"))),
    }
}

//! Payment provider adapters.
//!
//! - `stripe` - Checkout Sessions plus a signed webhook
//! - `esewa` - ePay v2 browser form signed with HMAC-SHA256, verified on return
//! - `khalti` - ePayment initiate plus a server-to-server lookup
//!
//! Each adapter only talks to its provider; the routes decide what happens to
//! the order.

mod error;
pub mod esewa;
pub mod khalti;
pub mod stripe;

pub use error::PaymentError;
pub use esewa::EsewaClient;
pub use khalti::KhaltiClient;
pub use stripe::StripeClient;

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use pasal_core::PaymentProvider;

use crate::config::PaymentsConfig;

type HmacSha256 = Hmac<Sha256>;

/// Timeout for calls to payment providers.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// The configured payment providers.
#[derive(Debug, Clone, Default)]
pub struct PaymentGateways {
    stripe: Option<StripeClient>,
    esewa: Option<EsewaClient>,
    khalti: Option<KhaltiClient>,
}

impl PaymentGateways {
    /// Build clients for every provider with credentials.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client cannot be built.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(Self {
            stripe: config
                .stripe
                .as_ref()
                .map(|c| StripeClient::new(http.clone(), c)),
            esewa: config.esewa.as_ref().map(EsewaClient::new),
            khalti: config
                .khalti
                .as_ref()
                .map(|c| KhaltiClient::new(http.clone(), c)),
        })
    }

    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if Stripe keys are absent.
    pub fn stripe(&self) -> Result<&StripeClient, PaymentError> {
        self.stripe
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PaymentProvider::Stripe))
    }

    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if eSewa keys are absent.
    pub fn esewa(&self) -> Result<&EsewaClient, PaymentError> {
        self.esewa
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PaymentProvider::Esewa))
    }

    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if Khalti keys are absent.
    pub fn khalti(&self) -> Result<&KhaltiClient, PaymentError> {
        self.khalti
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PaymentProvider::Khalti))
    }

    /// Providers that can take payments, for the storefront's checkout page.
    #[must_use]
    pub fn enabled(&self) -> Vec<PaymentProvider> {
        let mut providers = vec![PaymentProvider::CashOnDelivery];
        if self.stripe.is_some() {
            providers.push(PaymentProvider::Stripe);
        }
        if self.esewa.is_some() {
            providers.push(PaymentProvider::Esewa);
        }
        if self.khalti.is_some() {
            providers.push(PaymentProvider::Khalti);
        }
        providers
    }
}

/// HMAC-SHA256 of `message` under `key`.
fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, PaymentError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::KhaltiConfig;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_unconfigured_gateways() {
        let gateways = PaymentGateways::default();
        assert!(matches!(
            gateways.stripe(),
            Err(PaymentError::NotConfigured(PaymentProvider::Stripe))
        ));
        assert!(gateways.esewa().is_err());
        assert!(gateways.khalti().is_err());
        assert_eq!(gateways.enabled(), vec![PaymentProvider::CashOnDelivery]);
    }

    #[test]
    fn test_new_builds_configured_clients() {
        let config = PaymentsConfig {
            khalti: Some(KhaltiConfig {
                secret_key: SecretString::from("live_secret_key_68791341fdd94846a146f0457ff7b455"),
                base_url: "https://dev.khalti.com/api/v2".to_string(),
            }),
            ..Default::default()
        };
        let gateways = PaymentGateways::new(&config).unwrap();
        assert!(gateways.khalti().is_ok());
        assert!(gateways.stripe().is_err());
        assert!(gateways.enabled().contains(&PaymentProvider::Khalti));
    }
}

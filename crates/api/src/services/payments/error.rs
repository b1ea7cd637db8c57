//! Payment error types.

use thiserror::Error;

use pasal_core::PaymentProvider;

/// Errors from payment provider adapters.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Provider credentials are not configured.
    #[error("{0} payments are not configured")]
    NotConfigured(PaymentProvider),

    /// HTTP request to the provider failed.
    #[error("payment request failed: {0}")]
    Request(String),

    /// The provider rejected the request.
    #[error("payment provider error: {0}")]
    Api(String),

    /// Webhook or callback signature did not verify.
    #[error("invalid payment signature: {0}")]
    InvalidSignature(String),

    /// Webhook or callback body could not be understood.
    #[error("invalid payment payload: {0}")]
    InvalidPayload(String),

    /// The provider reported a different amount than the order total.
    #[error("paid amount does not match order total")]
    AmountMismatch,

    /// The provider reported the payment as not (yet) complete.
    #[error("payment not completed (status: {0})")]
    NotCompleted(String),

    /// The order is already paid, cancelled or otherwise not payable.
    #[error("order cannot be paid: {0}")]
    OrderNotPayable(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

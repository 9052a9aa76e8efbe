//! Payment error types.

use domain::{DomainError, PaymentId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while processing payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed payment request.
    #[error("{0}")]
    Validation(String),

    /// The charge was declined; the payment is recorded as failed.
    #[error("{reason}")]
    Declined {
        payment_id: PaymentId,
        reason: String,
    },

    /// Payment not found.
    #[error("Payment not found: {0}")]
    NotFound(PaymentId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        PaymentError::Validation(err.to_string())
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;

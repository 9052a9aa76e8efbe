//! Domain error types.

use common::PaymentId;
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the order state machine.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// Payment already reached a terminal status.
    #[error("Payment {payment_id} is already {status}")]
    PaymentFinalized {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
}

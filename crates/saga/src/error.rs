//! Saga error types.

use domain::{CustomerId, OrderError, OrderId, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the remote gateways.
///
/// `NotFound` means the service answered and the entity does not exist.
/// `Unavailable` means the request never reached the service. `ServerError`,
/// `Interrupted` and `Timeout` mean it may have been processed anyway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The remote service reports that the entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The remote service refused the request.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Connection or DNS failure before the request was sent.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a 5xx or 429 status.
    #[error("server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The connection failed after the request was sent.
    #[error("request interrupted: {0}")]
    Interrupted(String),

    /// The call exceeded its deadline. The request may have been processed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns true for failures worth retrying on an idempotent call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_)
                | GatewayError::ServerError { .. }
                | GatewayError::Interrupted(_)
                | GatewayError::Timeout(_)
        )
    }

    /// Returns true if the request is known not to have reached the service.
    pub fn is_undelivered(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }

    /// Returns true if the remote service refused the request outright.
    pub fn is_rejection(&self) -> bool {
        matches!(self, GatewayError::Rejected { .. })
    }
}

/// How a payment attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFailureKind {
    /// The payment service declined the charge.
    Rejected,

    /// The payment service could not be reached or did not answer in time.
    Unavailable,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Malformed input; nothing was written.
    #[error("{0}")]
    Validation(String),

    /// The customer service reports no such customer.
    #[error("Customer not found")]
    CustomerNotFound(CustomerId),

    /// The product service reports no such product.
    #[error("Product not found")]
    ProductNotFound(ProductId),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A dependency could not be reached.
    #[error("{service} service unavailable")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    /// Not enough stock for the requested quantity.
    #[error("Insufficient stock. Requested: {requested}, Available: {available}")]
    InsufficientStock { requested: u32, available: i64 },

    /// The order was written but its payment failed; the order was compensated.
    #[error("Order created but payment failed: {reason}")]
    PaymentFailed {
        order_id: OrderId,
        order_status: OrderStatus,
        reason: String,
        kind: PaymentFailureKind,
    },

    /// The requested status change is not allowed from the current status.
    #[error("{0}")]
    InvalidTransition(OrderError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    pub(crate) fn unavailable(service: &'static str, err: GatewayError) -> Self {
        SagaError::ServiceUnavailable {
            service,
            reason: err.to_string(),
        }
    }
}

impl From<OrderError> for SagaError {
    fn from(err: OrderError) -> Self {
        if err.is_validation() {
            SagaError::Validation(err.to_string())
        } else {
            SagaError::InvalidTransition(err)
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

//! Order record, commands and status state machine.

mod commands;
mod model;
mod state;

pub use commands::{DEFAULT_QUANTITY, PlaceOrder, UpdateOrderStatus};
pub use model::Order;
pub use state::OrderStatus;

use common::{Money, OrderId, PaymentId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Customer ID is required.
    #[error("customerId is required")]
    CustomerIdRequired,

    /// Product ID is required.
    #[error("productId is required")]
    ProductIdRequired,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be a positive integer)")]
    InvalidQuantity { quantity: i64 },

    /// Invalid unit price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: Money },

    /// Price × quantity does not fit in the amount type.
    #[error("Order amount overflows")]
    AmountOverflow,

    /// Order is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current_state} status")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Confirmation needs a recorded payment.
    #[error("Order {order_id} has no recorded payment")]
    PaymentRequired { order_id: OrderId },

    /// A different payment is already attached to the order.
    #[error("Order {order_id} already has payment {payment_id}")]
    PaymentAlreadyRecorded {
        order_id: OrderId,
        payment_id: PaymentId,
    },

    /// Unrecognized status name.
    #[error("Invalid order status: {0}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Returns true for errors caused by malformed input rather than by the
    /// current status of an existing order.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::CustomerIdRequired
                | OrderError::ProductIdRequired
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::AmountOverflow
                | OrderError::UnknownStatus(_)
        )
    }
}

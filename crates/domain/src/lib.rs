//! Domain layer for the order and payment services.
//!
//! This crate provides the records shared by the services:
//! - Order with its status state machine and commands
//! - Payment charge attempts
//! - Ledger transactions and the queue message that produces them

pub mod error;
pub mod order;
pub mod payment;
pub mod transaction;

pub use common::{CustomerId, InvalidAmount, Money, OrderId, PaymentId, ProductId, TransactionId};
pub use error::DomainError;
pub use order::{
    DEFAULT_QUANTITY, Order, OrderError, OrderStatus, PlaceOrder, UpdateOrderStatus,
};
pub use payment::{DEFAULT_PAYMENT_METHOD, Payment, PaymentRequest, PaymentStatus};
pub use transaction::{Transaction, TransactionIntent, TransactionStatus};

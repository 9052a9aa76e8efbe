//! Shared identifier and money types used across the order, payment and
//! ledger crates.

pub mod money;
pub mod types;

pub use money::{InvalidAmount, Money};
pub use types::{CustomerId, OrderId, PaymentId, ProductId, TransactionId};

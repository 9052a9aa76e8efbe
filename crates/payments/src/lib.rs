//! Payment service core.
//!
//! A [`PaymentProcessor`] records every charge attempt, asks an
//! [`ApprovalStrategy`] for the outcome and publishes completed payments to
//! the transaction ledger. [`LocalPaymentGateway`] wires the processor
//! straight into the order saga for single-process setups and tests.

pub mod approval;
pub mod error;
pub mod gateway;
pub mod processor;

pub use approval::{
    AlwaysApprove, AlwaysDecline, Approval, ApprovalStrategy, RandomApproval, SIMULATED_DECLINE,
};
pub use error::{PaymentError, Result};
pub use gateway::LocalPaymentGateway;
pub use processor::PaymentProcessor;

//! Order-creation saga.
//!
//! This crate coordinates a purchase across the customer, product and payment
//! services, which share no transaction manager:
//! 1. Validate the request
//! 2. Check customer and product concurrently
//! 3. Persist the order as pending
//! 4. Charge the customer
//! 5. Confirm the order, or cancel it as compensation when the charge fails
//!
//! [`OrderReconciler`] finishes orders left pending by a crash between
//! those steps.

pub mod clients;
pub mod coordinator;
pub mod error;
pub mod recovery;
pub mod retry;

pub use clients::{
    Customer, HttpInventoryGateway, HttpPaymentGateway, InMemoryInventoryGateway,
    InMemoryPaymentGateway, InventoryGateway, PaymentGateway, PaymentReceipt,
    ProductAvailability,
};
pub use coordinator::OrderSagaCoordinator;
pub use error::{GatewayError, PaymentFailureKind, Result, SagaError};
pub use recovery::{OrderReconciler, ReconcileReport};
pub use retry::RetryPolicy;

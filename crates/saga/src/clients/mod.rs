//! Gateway traits for the remote services the saga depends on, with HTTP
//! and in-memory implementations.

pub mod http;
pub mod inventory;
pub mod payment;

pub use http::{HttpInventoryGateway, HttpPaymentGateway};
pub use inventory::{Customer, InMemoryInventoryGateway, InventoryGateway, ProductAvailability};
pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentReceipt};

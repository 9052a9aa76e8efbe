//! Repositories for orders, payments and ledger transactions.
//!
//! Each record type is owned by one service: orders by the order service,
//! payments by the payment service and transactions by the ledger worker.
//! Both backends implement all three traits so a single store value can be
//! shared by tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{OrderQuery, PaymentQuery, TransactionQuery};
pub use repository::{OrderRepository, PaymentRepository, Recorded, TransactionRepository};

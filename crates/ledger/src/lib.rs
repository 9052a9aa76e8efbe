//! Asynchronous transaction ledger.
//!
//! The payment service publishes a [`domain::TransactionIntent`] for every
//! completed payment; a separate worker consumes the queue and records one
//! [`domain::Transaction`] per payment. Delivery is at-least-once:
//!
//! - the publisher uses persistent messages and publisher confirms
//! - the writer records by payment ID, so redeliveries are acknowledged
//!   without a second row
//! - store failures are requeued with backoff, then dead-lettered

pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod writer;

pub use config::AmqpConfig;
pub use connection::AmqpConnection;
pub use consumer::LedgerConsumer;
pub use error::{LedgerError, Result};
pub use memory::{InMemoryQueue, QueuedMessage};
pub use publisher::{AmqpPublisher, TransactionPublisher};
pub use writer::{Disposition, LedgerWriter};

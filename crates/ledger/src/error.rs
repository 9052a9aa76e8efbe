//! Ledger error types.

use thiserror::Error;

/// Errors that can occur while publishing or recording transactions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Could not connect to the broker or open a channel.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker did not accept a message.
    #[error("Publish error: {0}")]
    Publish(String),

    /// A message payload could not be decoded.
    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl From<lapin::Error> for LedgerError {
    fn from(err: lapin::Error) -> Self {
        LedgerError::Connection(err.to_string())
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;

use async_trait::async_trait;
use domain::{Order, OrderId, Payment, PaymentId, Transaction, TransactionId};

use crate::{OrderQuery, PaymentQuery, Result, TransactionQuery};

/// Persistence for orders.
///
/// Orders are never deleted. [`OrderRepository::update_order`] writes only
/// the mutable columns (status, payment ID, update time); the amount and
/// the other creation-time fields are fixed by
/// [`OrderRepository::insert_order`].
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order. Fails with `Conflict` if the ID is taken.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Persists the mutable fields of an existing order.
    async fn update_order(&self, order: &Order) -> Result<()>;

    /// Loads an order by ID.
    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Lists orders matching the query, newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;
}

/// Persistence for payment attempts.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a new payment. Fails with `Conflict` if the ID is taken.
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    /// Persists the status of an existing payment.
    async fn update_payment(&self, payment: &Payment) -> Result<()>;

    /// Loads a payment by ID.
    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>>;

    /// Lists payments matching the query, newest first.
    async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>>;
}

/// Outcome of recording a ledger transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A new row was written.
    Inserted(Transaction),

    /// A row for the same payment already existed and was left untouched.
    Duplicate(Transaction),
}

impl Recorded {
    /// Returns the stored transaction.
    pub fn transaction(&self) -> &Transaction {
        match self {
            Recorded::Inserted(tx) | Recorded::Duplicate(tx) => tx,
        }
    }

    /// Returns true if this call wrote the row.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Recorded::Inserted(_))
    }
}

/// Persistence for the transaction ledger.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Records a transaction, keyed by payment ID.
    ///
    /// Recording a second transaction for a payment that is already in the
    /// ledger is not an error: the existing row is returned as
    /// [`Recorded::Duplicate`].
    async fn record_transaction(&self, transaction: &Transaction) -> Result<Recorded>;

    /// Loads a transaction by ID.
    async fn get_transaction(&self, transaction_id: &TransactionId)
    -> Result<Option<Transaction>>;

    /// Loads the transaction recorded for a payment.
    async fn find_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Transaction>>;

    /// Lists transactions matching the query, newest first.
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
}

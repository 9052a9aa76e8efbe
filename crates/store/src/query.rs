use chrono::{DateTime, Utc};
use domain::{
    CustomerId, Order, OrderId, OrderStatus, Payment, PaymentId, PaymentStatus, Transaction,
    TransactionStatus,
};

/// Filter for listing orders. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by customer.
    pub customer_id: Option<CustomerId>,

    /// Filter by status.
    pub status: Option<OrderStatus>,

    /// Only orders created strictly before this instant.
    pub created_before: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to one customer.
    pub fn customer(mut self, customer_id: impl Into<CustomerId>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Restricts the query to one status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the query to orders created before `instant`.
    pub fn created_before(mut self, instant: DateTime<Utc>) -> Self {
        self.created_before = Some(instant);
        self
    }

    /// Caps the number of returned orders.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the order passes every filter.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(customer_id) = &self.customer_id
            && &order.customer_id != customer_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(before) = self.created_before
            && order.created_at >= before
        {
            return false;
        }
        true
    }
}

/// Filter for listing payments. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub status: Option<PaymentStatus>,
}

impl PaymentQuery {
    /// Creates a query for the payments of one order.
    pub fn for_order(order_id: impl Into<OrderId>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Default::default()
        }
    }

    /// Returns true if the payment passes every filter.
    pub fn matches(&self, payment: &Payment) -> bool {
        self.customer_id
            .as_ref()
            .is_none_or(|id| &payment.customer_id == id)
            && self
                .order_id
                .as_ref()
                .is_none_or(|id| &payment.order_id == id)
            && self.status.is_none_or(|status| payment.status == status)
    }
}

/// Filter for listing ledger transactions. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub payment_id: Option<PaymentId>,
    pub status: Option<TransactionStatus>,
}

impl TransactionQuery {
    /// Returns true if the transaction passes every filter.
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.customer_id
            .as_ref()
            .is_none_or(|id| &tx.customer_id == id)
            && self.order_id.as_ref().is_none_or(|id| &tx.order_id == id)
            && self
                .payment_id
                .as_ref()
                .is_none_or(|id| &tx.payment_id == id)
            && self.status.is_none_or(|status| tx.status == status)
    }
}

//! Ledger transactions and the queue message that produces them.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, PaymentId, ProductId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::payment::{Payment, PaymentStatus};

/// Status of a ledger transaction.
///
/// Only successful payments are published, so every transaction written by
/// the ledger worker is `Completed`; the other values exist for records
/// written by other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(DomainError::Validation(format!(
                "Invalid transaction status: {other}"
            ))),
        }
    }
}

/// Message published after a successful payment, asking the ledger to
/// record it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIntent {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl TransactionIntent {
    /// Builds the intent for a completed payment.
    pub fn for_payment(payment: &Payment) -> Result<Self, DomainError> {
        if payment.status != PaymentStatus::Completed {
            return Err(DomainError::Validation(format!(
                "payment {} is {}, only completed payments are recorded",
                payment.payment_id, payment.status
            )));
        }
        Ok(Self {
            payment_id: payment.payment_id.clone(),
            customer_id: payment.customer_id.clone(),
            order_id: payment.order_id.clone(),
            product_id: payment.product_id.clone(),
            amount: payment.amount,
            timestamp: Utc::now(),
        })
    }

    /// Checks fields that JSON decoding alone cannot.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.payment_id.is_blank() {
            return Err(DomainError::Validation("paymentId is required".into()));
        }
        if self.order_id.is_blank() {
            return Err(DomainError::Validation("orderId is required".into()));
        }
        if self.amount.is_negative() {
            return Err(DomainError::Validation("amount must not be negative".into()));
        }
        Ok(())
    }
}

/// A ledger record of a completed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub amount: Money,
    pub status: TransactionStatus,
    pub processed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a completed transaction for an intent, processed now.
    pub fn completed(intent: TransactionIntent) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: TransactionId::generate(),
            payment_id: intent.payment_id,
            customer_id: intent.customer_id,
            order_id: intent.order_id,
            product_id: intent.product_id,
            amount: intent.amount,
            status: TransactionStatus::Completed,
            processed_at: now,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentRequest;

    fn completed_payment() -> Payment {
        let mut payment = Payment::initiate(
            PaymentId::new("PAY-1"),
            PaymentRequest {
                customer_id: CustomerId::new("C1"),
                order_id: OrderId::new("ORDER-1"),
                product_id: ProductId::new("P1"),
                amount: Money::from_cents(19998),
            },
        );
        payment.complete().unwrap();
        payment
    }

    #[test]
    fn test_intent_only_for_completed_payments() {
        let mut pending = completed_payment();
        pending.status = PaymentStatus::Pending;
        assert!(TransactionIntent::for_payment(&pending).is_err());

        let intent = TransactionIntent::for_payment(&completed_payment()).unwrap();
        assert_eq!(intent.payment_id, PaymentId::new("PAY-1"));
        assert_eq!(intent.amount, Money::from_cents(19998));
    }

    #[test]
    fn test_transaction_id_differs_from_payment_id() {
        let intent = TransactionIntent::for_payment(&completed_payment()).unwrap();
        let tx = Transaction::completed(intent);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_ne!(tx.transaction_id.as_str(), tx.payment_id.as_str());
    }

    #[test]
    fn test_intent_decodes_iso_timestamp() {
        let raw = r#"{
            "paymentId": "PAY-1",
            "customerId": "C1",
            "orderId": "ORDER-1",
            "productId": "P1",
            "amount": 199.98,
            "timestamp": "2024-05-01T10:15:30.000Z"
        }"#;
        let intent: TransactionIntent = serde_json::from_str(raw).unwrap();
        assert!(intent.validate().is_ok());
        assert_eq!(intent.timestamp.to_rfc3339(), "2024-05-01T10:15:30+00:00");
    }

    #[test]
    fn test_validate_rejects_blank_payment_id() {
        let mut intent = TransactionIntent::for_payment(&completed_payment()).unwrap();
        intent.payment_id = PaymentId::new("");
        assert!(intent.validate().is_err());
    }
}

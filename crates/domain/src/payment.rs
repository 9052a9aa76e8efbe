//! Payment records.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, PaymentId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Payment method recorded for simulated payments.
pub const DEFAULT_PAYMENT_METHOD: &str = "demo_payment";

/// Status of a payment.
///
/// ```text
/// Pending ──┬──► Completed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::Validation(format!(
                "Invalid payment status: {other}"
            ))),
        }
    }
}

/// A request to charge a customer for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub amount: Money,
}

impl PaymentRequest {
    /// Checks that all identifiers are present and the amount is positive.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_id.is_blank() {
            return Err(DomainError::Validation("customerId is required".into()));
        }
        if self.order_id.is_blank() {
            return Err(DomainError::Validation("orderId is required".into()));
        }
        if self.product_id.is_blank() {
            return Err(DomainError::Validation("productId is required".into()));
        }
        if !self.amount.is_positive() {
            return Err(DomainError::Validation(
                "amount must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// A charge attempt recorded by the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Starts a pending payment for a validated request.
    pub fn initiate(payment_id: PaymentId, request: PaymentRequest) -> Self {
        let now = Utc::now();
        Self {
            payment_id,
            customer_id: request.customer_id,
            order_id: request.order_id,
            product_id: request.product_id,
            amount: request.amount,
            status: PaymentStatus::Pending,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the payment completed.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.finish(PaymentStatus::Completed)
    }

    /// Marks the payment failed.
    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.finish(PaymentStatus::Failed)
    }

    fn finish(&mut self, status: PaymentStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::PaymentFinalized {
                payment_id: self.payment_id.clone(),
                status: self.status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now().max(self.updated_at);
        Ok(())
    }
}

//! Payment gateway trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{OrderId, PaymentId, PaymentRequest, PaymentStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::GatewayError;

/// Synchronous answer of the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
}

impl PaymentReceipt {
    /// Returns true if the charge went through.
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Charges customers through the payment service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits a charge.
    ///
    /// A declined charge is reported as [`GatewayError::Rejected`]; a
    /// transport failure as `Unavailable` or `Timeout`.
    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError>;

    /// Looks up a completed payment for an order, if any.
    ///
    /// Used by crash recovery for orders whose outcome was never recorded.
    async fn find_payment_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentReceipt>, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError> {
        (**self).submit(request).await
    }

    async fn find_payment_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentReceipt>, GatewayError> {
        (**self).find_payment_for_order(order_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: Vec<(PaymentRequest, PaymentReceipt)>,
    next_id: u32,
    decline: bool,
    unavailable: bool,
    submissions: usize,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway that approves every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every charge get declined.
    pub async fn set_decline(&self, decline: bool) {
        self.state.write().await.decline = decline;
    }

    /// Makes every call fail as if the service were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the number of charge attempts received.
    pub async fn submission_count(&self) -> usize {
        self.state.read().await.submissions
    }

    /// Returns the number of completed payments.
    pub async fn completed_count(&self) -> usize {
        self.state
            .read()
            .await
            .payments
            .iter()
            .filter(|(_, receipt)| receipt.is_completed())
            .count()
    }

    /// Records a completed charge directly, as if a submission succeeded but
    /// its answer never reached the caller.
    pub async fn record_completed(&self, request: PaymentRequest) -> PaymentReceipt {
        let mut state = self.state.write().await;
        let receipt = Self::issue(&mut state, PaymentStatus::Completed);
        state.payments.push((request, receipt.clone()));
        receipt
    }

    fn issue(state: &mut InMemoryPaymentState, status: PaymentStatus) -> PaymentReceipt {
        state.next_id += 1;
        PaymentReceipt {
            payment_id: PaymentId::new(format!("PAY-{:04}", state.next_id)),
            status,
        }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError> {
        let mut state = self.state.write().await;
        state.submissions += 1;

        if state.unavailable {
            return Err(GatewayError::Unavailable("payment service down".into()));
        }

        if state.decline {
            let receipt = Self::issue(&mut state, PaymentStatus::Failed);
            state.payments.push((request.clone(), receipt));
            return Err(GatewayError::Rejected {
                status: 400,
                message: "Payment declined".into(),
            });
        }

        let receipt = Self::issue(&mut state, PaymentStatus::Completed);
        state.payments.push((request.clone(), receipt.clone()));
        Ok(receipt)
    }

    async fn find_payment_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentReceipt>, GatewayError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(GatewayError::Unavailable("payment service down".into()));
        }
        Ok(state
            .payments
            .iter()
            .rev()
            .find(|(request, receipt)| &request.order_id == order_id && receipt.is_completed())
            .map(|(_, receipt)| receipt.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerId, Money, ProductId};

    fn request(order: &str) -> PaymentRequest {
        PaymentRequest {
            customer_id: CustomerId::new("C1"),
            order_id: OrderId::new(order),
            product_id: ProductId::new("P1"),
            amount: Money::from_cents(5000),
        }
    }

    #[tokio::test]
    async fn test_submit_and_find() {
        let gateway = InMemoryPaymentGateway::new();

        let receipt = gateway.submit(&request("ORDER-1")).await.unwrap();
        assert!(receipt.payment_id.as_str().starts_with("PAY-"));
        assert!(receipt.is_completed());

        let found = gateway
            .find_payment_for_order(&OrderId::new("ORDER-1"))
            .await
            .unwrap();
        assert_eq!(found, Some(receipt));
        assert!(
            gateway
                .find_payment_for_order(&OrderId::new("ORDER-2"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_declined_charge_is_not_found_later() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_decline(true).await;

        let result = gateway.submit(&request("ORDER-1")).await;
        assert!(matches!(result, Err(GatewayError::Rejected { status: 400, .. })));
        assert_eq!(gateway.submission_count().await, 1);
        assert_eq!(gateway.completed_count().await, 0);
        assert!(
            gateway
                .find_payment_for_order(&OrderId::new("ORDER-1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_sequential_payment_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let r1 = gateway.submit(&request("ORDER-1")).await.unwrap();
        let r2 = gateway.submit(&request("ORDER-2")).await.unwrap();
        assert_eq!(r1.payment_id.as_str(), "PAY-0001");
        assert_eq!(r2.payment_id.as_str(), "PAY-0002");
    }
}

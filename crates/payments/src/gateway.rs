//! In-process payment gateway.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{OrderId, PaymentRequest, PaymentStatus};
use saga::{GatewayError, PaymentGateway, PaymentReceipt};
use store::{PaymentQuery, PaymentRepository};

use crate::error::PaymentError;
use crate::processor::PaymentProcessor;

/// Lets the order saga call a [`PaymentProcessor`] directly instead of over
/// HTTP. Errors are mapped the way the HTTP client maps status codes.
pub struct LocalPaymentGateway<S: PaymentRepository> {
    processor: Arc<PaymentProcessor<S>>,
}

impl<S: PaymentRepository> LocalPaymentGateway<S> {
    pub fn new(processor: Arc<PaymentProcessor<S>>) -> Self {
        Self { processor }
    }
}

impl<S: PaymentRepository> Clone for LocalPaymentGateway<S> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
        }
    }
}

#[async_trait]
impl<S: PaymentRepository> PaymentGateway for LocalPaymentGateway<S> {
    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError> {
        match self.processor.process(request.clone()).await {
            Ok(payment) => Ok(PaymentReceipt {
                payment_id: payment.payment_id,
                status: payment.status,
            }),
            Err(PaymentError::Declined { reason, .. }) => Err(GatewayError::Rejected {
                status: 400,
                message: reason,
            }),
            Err(PaymentError::Validation(message)) => Err(GatewayError::Rejected {
                status: 400,
                message,
            }),
            Err(err) => Err(GatewayError::ServerError {
                status: 500,
                message: err.to_string(),
            }),
        }
    }

    async fn find_payment_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentReceipt>, GatewayError> {
        let query = PaymentQuery {
            status: Some(PaymentStatus::Completed),
            ..PaymentQuery::for_order(order_id.clone())
        };
        let payments = self
            .processor
            .list_payments(&query)
            .await
            .map_err(|e| GatewayError::ServerError {
                status: 500,
                message: e.to_string(),
            })?;
        Ok(payments.into_iter().next().map(|payment| PaymentReceipt {
            payment_id: payment.payment_id,
            status: payment.status,
        }))
    }
}

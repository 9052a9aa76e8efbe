//! Payment processing.

use std::sync::Arc;

use domain::{Payment, PaymentId, PaymentRequest, TransactionIntent};
use ledger::TransactionPublisher;
use store::{PaymentQuery, PaymentRepository};

use crate::approval::{Approval, ApprovalStrategy};
use crate::error::{PaymentError, Result};

/// Charges customers and hands completed payments to the ledger.
///
/// Every attempt is written as `pending` before the approval decision and
/// then finalized as `completed` or `failed`. Ledger publishing happens
/// after the payment is final and never changes its outcome.
pub struct PaymentProcessor<S: PaymentRepository> {
    store: S,
    approval: Arc<dyn ApprovalStrategy>,
    publisher: Arc<dyn TransactionPublisher>,
}

impl<S: PaymentRepository> PaymentProcessor<S> {
    /// Creates a new payment processor.
    pub fn new(
        store: S,
        approval: Arc<dyn ApprovalStrategy>,
        publisher: Arc<dyn TransactionPublisher>,
    ) -> Self {
        Self {
            store,
            approval,
            publisher,
        }
    }

    /// Returns the payment repository.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes one charge.
    ///
    /// Returns the completed payment, or [`PaymentError::Declined`] after
    /// recording the attempt as failed.
    #[tracing::instrument(
        skip(self, request),
        fields(order_id = %request.order_id, amount = %request.amount)
    )]
    pub async fn process(&self, request: PaymentRequest) -> Result<Payment> {
        request.validate()?;

        let mut payment = Payment::initiate(PaymentId::generate(), request);
        self.store.insert_payment(&payment).await?;

        match self.approval.decide(&payment) {
            Approval::Approved => {
                payment.complete()?;
                self.store.update_payment(&payment).await?;
                metrics::counter!("payments_processed_total", "outcome" => "completed")
                    .increment(1);
                tracing::info!(payment_id = %payment.payment_id, "payment completed");

                self.publish(&payment).await;
                Ok(payment)
            }
            Approval::Declined(reason) => {
                payment.fail()?;
                self.store.update_payment(&payment).await?;
                metrics::counter!("payments_processed_total", "outcome" => "failed").increment(1);
                tracing::info!(payment_id = %payment.payment_id, %reason, "payment declined");

                Err(PaymentError::Declined {
                    payment_id: payment.payment_id,
                    reason,
                })
            }
        }
    }

    async fn publish(&self, payment: &Payment) {
        let result = match TransactionIntent::for_payment(payment) {
            Ok(intent) => self.publisher.publish(&intent).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = result {
            metrics::counter!("ledger_publish_failures_total").increment(1);
            tracing::warn!(
                payment_id = %payment.payment_id,
                %error,
                "failed to publish transaction, ledger entry is missing"
            );
        }
    }

    /// Loads a payment by ID.
    pub async fn get_payment(&self, payment_id: &PaymentId) -> Result<Payment> {
        self.store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.clone()))
    }

    /// Lists payments matching the query, newest first.
    pub async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>> {
        Ok(self.store.list_payments(query).await?)
    }
}

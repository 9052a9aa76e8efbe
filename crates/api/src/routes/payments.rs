//! Payment processing and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use domain::{
    CustomerId, Money, OrderId, Payment, PaymentId, PaymentRequest, PaymentStatus, ProductId,
};
use payments::{PaymentError, PaymentProcessor};
use serde::{Deserialize, Serialize};
use store::{PaymentQuery, PaymentRepository, TransactionRepository};

use crate::error::ApiError;

/// Shared state of the payment service.
///
/// The ledger is read-only here; transactions are written by the worker.
pub struct PaymentState<S: PaymentRepository + TransactionRepository> {
    pub processor: PaymentProcessor<S>,
    pub ledger: S,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsParams {
    pub customer_id: Option<String>,
    pub order_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentResponse {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub message: &'static str,
}

impl From<Payment> for ProcessPaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            customer_id: payment.customer_id,
            order_id: payment.order_id,
            product_id: payment.product_id,
            amount: payment.amount,
            status: payment.status,
            message: "Payment processed successfully",
        }
    }
}

/// POST /api/payments/process: charge a customer.
pub async fn process<S: PaymentRepository + TransactionRepository + 'static>(
    State(state): State<Arc<PaymentState<S>>>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<ProcessPaymentResponse>, ApiError> {
    let Json(request) = payload?;
    let payment = state.processor.process(request).await?;
    Ok(Json(payment.into()))
}

/// GET /api/payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: PaymentRepository + TransactionRepository + 'static>(
    State(state): State<Arc<PaymentState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state.processor.get_payment(&PaymentId::new(id)).await?;
    Ok(Json(payment))
}

/// GET /api/payments: list payments, newest first.
#[tracing::instrument(skip_all)]
pub async fn list<S: PaymentRepository + TransactionRepository + 'static>(
    State(state): State<Arc<PaymentState<S>>>,
    params: Result<Query<ListPaymentsParams>, QueryRejection>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let Query(params) = params?;
    let status = match params.status.filter(|s| !s.is_empty()) {
        Some(status) => Some(
            status
                .parse::<PaymentStatus>()
                .map_err(PaymentError::from)?,
        ),
        None => None,
    };
    let query = PaymentQuery {
        customer_id: non_empty(params.customer_id).map(CustomerId::new),
        order_id: non_empty(params.order_id).map(OrderId::new),
        status,
    };
    let payments = state.processor.list_payments(&query).await?;
    Ok(Json(payments))
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

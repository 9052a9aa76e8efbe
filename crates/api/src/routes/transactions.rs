//! Ledger query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use domain::{CustomerId, OrderId, PaymentId, Transaction, TransactionId, TransactionStatus};
use serde::Deserialize;
use store::{PaymentRepository, TransactionQuery, TransactionRepository};

use super::payments::{PaymentState, non_empty};
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsParams {
    pub customer_id: Option<String>,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub status: Option<String>,
}

/// GET /api/transactions/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: PaymentRepository + TransactionRepository + 'static>(
    State(state): State<Arc<PaymentState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction = state
        .ledger
        .get_transaction(&TransactionId::new(id))
        .await?
        .ok_or(ApiError::NotFound("Transaction"))?;
    Ok(Json(transaction))
}

/// GET /api/transactions: list ledger entries, newest first.
#[tracing::instrument(skip_all)]
pub async fn list<S: PaymentRepository + TransactionRepository + 'static>(
    State(state): State<Arc<PaymentState<S>>>,
    params: Result<Query<ListTransactionsParams>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let Query(params) = params?;
    let status = match non_empty(params.status) {
        Some(status) => Some(
            status
                .parse::<TransactionStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };
    let query = TransactionQuery {
        customer_id: non_empty(params.customer_id).map(CustomerId::new),
        order_id: non_empty(params.order_id).map(OrderId::new),
        payment_id: non_empty(params.payment_id).map(PaymentId::new),
        status,
    };
    let transactions = state.ledger.list_transactions(&query).await?;
    Ok(Json(transactions))
}

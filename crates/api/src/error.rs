//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use payments::PaymentError;
use saga::SagaError;
use serde_json::json;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
///
/// Every response carries a JSON body with an `error` field.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(&'static str),
    /// Bad request from the client.
    BadRequest(String),
    /// Order saga or order update error.
    Saga(SagaError),
    /// Payment processing error.
    Payment(PaymentError),
    /// Repository error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(entity) => error_body(StatusCode::NOT_FOUND, format!("{entity} not found")),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Store(err) => internal(&err),
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn internal(err: &dyn std::error::Error) -> Response {
    tracing::error!(error = %err, "internal server error");
    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn saga_error_to_response(err: SagaError) -> Response {
    match &err {
        SagaError::PaymentFailed {
            order_id,
            order_status,
            ..
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": err.to_string(),
                "orderId": order_id,
                "orderStatus": order_status,
            })),
        )
            .into_response(),
        SagaError::Validation(_)
        | SagaError::CustomerNotFound(_)
        | SagaError::ProductNotFound(_)
        | SagaError::ServiceUnavailable { .. }
        | SagaError::InsufficientStock { .. } => error_body(StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::OrderNotFound(_) => error_body(StatusCode::NOT_FOUND, "Order not found".to_string()),
        SagaError::InvalidTransition(_) => error_body(StatusCode::CONFLICT, err.to_string()),
        SagaError::Store(_) => internal(&err),
    }
}

fn payment_error_to_response(err: PaymentError) -> Response {
    match err {
        PaymentError::Declined { payment_id, reason } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "paymentId": payment_id,
                "status": "failed",
                "error": reason,
            })),
        )
            .into_response(),
        PaymentError::Validation(msg) => error_body(StatusCode::BAD_REQUEST, msg),
        PaymentError::NotFound(_) => {
            error_body(StatusCode::NOT_FOUND, "Payment not found".to_string())
        }
        PaymentError::Store(err) => internal(&err),
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Saga(err.into())
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

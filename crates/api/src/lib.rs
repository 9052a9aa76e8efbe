//! HTTP services and process plumbing for order processing.
//!
//! Two routers are exposed: the order service (saga, order queries and
//! status updates) and the payment service (payment processing, payment
//! and ledger queries). Both carry request tracing, permissive CORS, a
//! health check and the Prometheus metrics endpoint.

pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{OrderRepository, PaymentRepository, TransactionRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::OrderState;
use routes::payments::PaymentState;

/// Creates the order service router.
pub fn create_order_app<S: OrderRepository + 'static>(
    state: Arc<OrderState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let api = Router::new()
        .route(
            "/api/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/api/orders/{id}/status",
            patch(routes::orders::update_status::<S>).put(routes::orders::update_status::<S>),
        )
        .with_state(state);

    finish(api, "order-service", metrics_handle)
}

/// Creates the payment service router.
pub fn create_payment_app<S>(state: Arc<PaymentState<S>>, metrics_handle: PrometheusHandle) -> Router
where
    S: PaymentRepository + TransactionRepository + 'static,
{
    let api = Router::new()
        .route("/api/payments/process", post(routes::payments::process::<S>))
        .route("/api/payments", get(routes::payments::list::<S>))
        .route("/api/payments/{id}", get(routes::payments::get::<S>))
        .route("/api/transactions", get(routes::transactions::list::<S>))
        .route("/api/transactions/{id}", get(routes::transactions::get::<S>))
        .with_state(state);

    finish(api, "payment-service", metrics_handle)
}

fn finish(api: Router, service: &'static str, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    api.route("/health", get(move || routes::health::check(service)))
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

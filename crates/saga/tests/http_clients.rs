//! HTTP gateway clients against stub services bound to ephemeral ports.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domain::{CustomerId, Money, OrderId, PaymentRequest, PaymentStatus, ProductId};
use saga::{
    GatewayError, HttpInventoryGateway, HttpPaymentGateway, InventoryGateway, PaymentGateway,
    RetryPolicy,
};
use serde_json::{Value, json};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(500),
        max_retries: 2,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

async fn customer(Path(id): Path<String>) -> Response {
    if id == "C1" {
        Json(json!({ "customerId": "C1", "name": "Ada", "email": "ada@example.com", "phone": "5551234567" }))
            .into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "Customer not found" }))).into_response()
    }
}

async fn availability(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, u32>>,
) -> Response {
    if id != "P1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Product not found" }))).into_response();
    }
    let quantity = params.get("quantity").copied().unwrap_or(1);
    Json(json!({
        "productId": "P1",
        "available": quantity <= 10,
        "requestedQuantity": quantity,
        "availableStock": 10,
        "price": 99.99
    }))
    .into_response()
}

fn catalog() -> Router {
    Router::new()
        .route("/api/customers/{id}", get(customer))
        .route("/api/products/{id}/availability", get(availability))
}

async fn process(Json(body): Json<Value>) -> Response {
    let amount = body["amount"].as_f64().unwrap_or(0.0);
    if amount > 1000.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "paymentId": "PAY-2", "status": "failed", "error": "Payment declined" })),
        )
            .into_response();
    }
    Json(json!({
        "paymentId": "PAY-1",
        "customerId": body["customerId"],
        "orderId": body["orderId"],
        "productId": body["productId"],
        "amount": amount,
        "status": "completed",
        "message": "Payment processed successfully"
    }))
    .into_response()
}

async fn list_payments(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("orderId").map(String::as_str) == Some("ORDER-1")
        && params.get("status").map(String::as_str) == Some("completed")
    {
        Json(json!([{ "paymentId": "PAY-1", "status": "completed", "orderId": "ORDER-1" }]))
    } else {
        Json(json!([]))
    }
}

fn payment_service() -> Router {
    Router::new()
        .route("/api/payments/process", post(process))
        .route("/api/payments", get(list_payments))
}

fn payment_request(amount: Money) -> PaymentRequest {
    PaymentRequest {
        customer_id: CustomerId::new("C1"),
        order_id: OrderId::new("ORDER-1"),
        product_id: ProductId::new("P1"),
        amount,
    }
}

#[tokio::test]
async fn customer_lookup_distinguishes_not_found() {
    let base = serve(catalog()).await;
    let gateway = HttpInventoryGateway::new(&base, &base, fast_policy()).unwrap();

    let found = gateway.get_customer(&CustomerId::new("C1")).await.unwrap();
    assert_eq!(found.customer_id, CustomerId::new("C1"));
    assert_eq!(found.name.as_deref(), Some("Ada"));

    let missing = gateway.get_customer(&CustomerId::new("C9")).await;
    assert_eq!(missing, Err(GatewayError::NotFound("Customer")));
}

#[tokio::test]
async fn product_availability_passes_quantity() {
    let base = serve(catalog()).await;
    let gateway = HttpInventoryGateway::new(&base, &base, fast_policy()).unwrap();

    let ok = gateway
        .get_product_availability(&ProductId::new("P1"), 2)
        .await
        .unwrap();
    assert!(ok.available);
    assert_eq!(ok.requested_quantity, 2);
    assert_eq!(ok.unit_price, Money::from_cents(9999));

    let short = gateway
        .get_product_availability(&ProductId::new("P1"), 11)
        .await
        .unwrap();
    assert!(!short.available);
    assert_eq!(short.available_stock, 10);

    let missing = gateway
        .get_product_availability(&ProductId::new("P9"), 1)
        .await;
    assert_eq!(missing, Err(GatewayError::NotFound("Product")));
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let gateway = HttpInventoryGateway::new(&base, &base, fast_policy()).unwrap();
    let result = gateway.get_customer(&CustomerId::new("C1")).await;
    assert!(matches!(result, Err(GatewayError::Unavailable(_))));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/customers/{id}",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    Json(json!({ "customerId": "C1" })).into_response()
                }
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;
    let gateway = HttpInventoryGateway::new(&base, &base, fast_policy()).unwrap();

    let customer = gateway.get_customer(&CustomerId::new("C1")).await.unwrap();
    assert_eq!(customer.customer_id, CustomerId::new("C1"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/customers/{id}",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::INTERNAL_SERVER_ERROR
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;
    let gateway = HttpInventoryGateway::new(&base, &base, fast_policy()).unwrap();

    let result = gateway.get_customer(&CustomerId::new("C1")).await;
    assert!(matches!(
        result,
        Err(GatewayError::ServerError { status: 500, .. })
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn slow_service_times_out() {
    let router = Router::new().route(
        "/api/customers/{id}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "customerId": "C1" }))
        }),
    );
    let base = serve(router).await;
    let policy = RetryPolicy::new(Duration::from_millis(100), 0);
    let gateway = HttpInventoryGateway::new(&base, &base, policy).unwrap();

    let result = gateway.get_customer(&CustomerId::new("C1")).await;
    assert!(matches!(result, Err(GatewayError::Timeout(_))));
}

#[tokio::test]
async fn payment_success_returns_receipt() {
    let base = serve(payment_service()).await;
    let gateway = HttpPaymentGateway::new(&base, fast_policy()).unwrap();

    let receipt = gateway
        .submit(&payment_request(Money::from_decimal(199.98).unwrap()))
        .await
        .unwrap();
    assert_eq!(receipt.payment_id.as_str(), "PAY-1");
    assert_eq!(receipt.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn payment_rejection_carries_message() {
    let base = serve(payment_service()).await;
    let gateway = HttpPaymentGateway::new(&base, fast_policy()).unwrap();

    let result = gateway
        .submit(&payment_request(Money::from_decimal(5000.0).unwrap()))
        .await;
    assert_eq!(
        result,
        Err(GatewayError::Rejected {
            status: 400,
            message: "Payment declined".into()
        })
    );
}

#[tokio::test]
async fn payment_timeout_is_not_resubmitted() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/payments/process",
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::OK
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;
    let policy = RetryPolicy {
        timeout: Duration::from_millis(100),
        ..fast_policy()
    };
    let gateway = HttpPaymentGateway::new(&base, policy).unwrap();

    let result = gateway.submit(&payment_request(Money::from_cents(100))).await;
    assert!(matches!(result, Err(GatewayError::Timeout(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn payment_gateway_error_is_not_resubmitted() {
    let charges = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/payments/process",
            post(|State(charges): State<Arc<AtomicUsize>>| async move {
                if charges.fetch_add(1, Ordering::SeqCst) == 0 {
                    StatusCode::GATEWAY_TIMEOUT.into_response()
                } else {
                    Json(json!({ "paymentId": "PAY-1", "status": "completed" })).into_response()
                }
            }),
        )
        .with_state(charges.clone());
    let base = serve(router).await;
    let gateway = HttpPaymentGateway::new(&base, fast_policy()).unwrap();

    let result = gateway.submit(&payment_request(Money::from_cents(100))).await;
    assert!(matches!(
        result,
        Err(GatewayError::ServerError { status: 504, .. })
    ));
    assert_eq!(charges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_payment_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let gateway = HttpPaymentGateway::new(&base, fast_policy()).unwrap();
    let result = gateway.submit(&payment_request(Money::from_cents(100))).await;
    assert!(matches!(result, Err(GatewayError::Unavailable(_))));
}

#[tokio::test]
async fn find_payment_for_order_queries_completed() {
    let base = serve(payment_service()).await;
    let gateway = HttpPaymentGateway::new(&base, fast_policy()).unwrap();

    let found = gateway
        .find_payment_for_order(&OrderId::new("ORDER-1"))
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.payment_id.into_inner()), Some("PAY-1".into()));

    let none = gateway
        .find_payment_for_order(&OrderId::new("ORDER-2"))
        .await
        .unwrap();
    assert!(none.is_none());
}

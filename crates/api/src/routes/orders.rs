//! Order creation, query and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{DEFAULT_QUANTITY, Order, OrderId, OrderStatus, PlaceOrder, UpdateOrderStatus};
use saga::{InventoryGateway, OrderSagaCoordinator, PaymentGateway};
use serde::Deserialize;
use store::{OrderQuery, OrderRepository};

use crate::error::ApiError;

/// Saga coordinator with its gateways behind trait objects, so HTTP and
/// in-memory collaborators can be swapped without changing the state type.
pub type OrderCoordinator<S> =
    OrderSagaCoordinator<S, Arc<dyn InventoryGateway>, Arc<dyn PaymentGateway>>;

/// Shared state of the order service.
pub struct OrderState<S: OrderRepository> {
    pub coordinator: OrderCoordinator<S>,
}

impl<S: OrderRepository> OrderState<S> {
    pub fn new(
        orders: S,
        inventory: Arc<dyn InventoryGateway>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            coordinator: OrderSagaCoordinator::new(orders, inventory, payments),
        }
    }
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub product_id: String,
    pub quantity: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_status: Option<String>,
}

// -- Handlers --

/// POST /api/orders: run the order-creation saga.
pub async fn create<S: OrderRepository + 'static>(
    State(state): State<Arc<OrderState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = payload?;
    let command = PlaceOrder::new(
        req.customer_id,
        req.product_id,
        req.quantity.unwrap_or(DEFAULT_QUANTITY),
    );
    let order = state.coordinator.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderRepository + 'static>(
    State(state): State<Arc<OrderState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.coordinator.get_order(&OrderId::new(id)).await?;
    Ok(Json(order))
}

/// GET /api/orders: list orders, newest first, optionally filtered by
/// customer and status.
#[tracing::instrument(skip_all)]
pub async fn list<S: OrderRepository + 'static>(
    State(state): State<Arc<OrderState<S>>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(params) = params?;
    let mut query = OrderQuery::new();
    if let Some(customer_id) = params.customer_id.filter(|id| !id.is_empty()) {
        query = query.customer(customer_id);
    }
    if let Some(status) = params.status.filter(|s| !s.is_empty()) {
        query = query.status(status.parse::<OrderStatus>()?);
    }
    let orders = state.coordinator.list_orders(&query).await?;
    Ok(Json(orders))
}

/// PATCH /api/orders/{id}/status: operator status change.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: OrderRepository + 'static>(
    State(state): State<Arc<OrderState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(req) = payload?;
    let status = req.order_status.unwrap_or_default();
    let command = UpdateOrderStatus::parse(id, &status)?;
    let order = state.coordinator.update_status(command).await?;
    Ok(Json(order))
}

//! Order-creation saga.

use std::time::Instant;

use domain::{
    CustomerId, Order, OrderId, PaymentId, PaymentRequest, PlaceOrder, ProductId,
    UpdateOrderStatus,
};
use store::{OrderQuery, OrderRepository};

use crate::clients::{InventoryGateway, PaymentGateway, ProductAvailability};
use crate::error::{GatewayError, PaymentFailureKind, Result, SagaError};

/// Orchestrates order creation across the customer, product and payment
/// services.
///
/// The saga validates the request, checks customer and product concurrently,
/// persists the order as `pending`, charges the customer and then either
/// confirms the order or cancels it as compensation. Cancelled orders are
/// kept as an audit trail.
pub struct OrderSagaCoordinator<R, I, P>
where
    R: OrderRepository,
    I: InventoryGateway,
    P: PaymentGateway,
{
    orders: R,
    inventory: I,
    payments: P,
}

impl<R, I, P> OrderSagaCoordinator<R, I, P>
where
    R: OrderRepository,
    I: InventoryGateway,
    P: PaymentGateway,
{
    /// Creates a new saga coordinator.
    pub fn new(orders: R, inventory: I, payments: P) -> Self {
        Self {
            orders,
            inventory,
            payments,
        }
    }

    /// Returns the order repository.
    pub fn orders(&self) -> &R {
        &self.orders
    }

    /// Runs the order-creation saga.
    ///
    /// Returns the confirmed order. Fails without writing anything when the
    /// input is malformed, a dependency check fails or stock is short. Once
    /// the pending order is written, a payment failure cancels it and returns
    /// [`SagaError::PaymentFailed`] carrying the order ID.
    #[tracing::instrument(
        skip(self, command),
        fields(
            customer_id = %command.customer_id,
            product_id = %command.product_id,
            quantity = command.quantity,
        )
    )]
    pub async fn create_order(&self, command: PlaceOrder) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_saga(command).await;
        metrics::histogram!("order_saga_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_saga(&self, command: PlaceOrder) -> Result<Order> {
        // 1. Validate input shape
        let quantity = command.validate()?;

        // 2. Customer and product checks in parallel
        let availability = self
            .check_dependencies(&command.customer_id, &command.product_id, quantity)
            .await?;
        if !availability.available {
            tracing::info!(
                requested = quantity,
                available = availability.available_stock,
                "insufficient stock"
            );
            return Err(SagaError::InsufficientStock {
                requested: quantity,
                available: availability.available_stock,
            });
        }

        // 3. Persist the pending order
        let mut order = Order::place(
            OrderId::generate(),
            command.customer_id,
            command.product_id,
            quantity,
            availability.unit_price,
        )?;
        self.orders.insert_order(&order).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.order_id, amount = %order.amount, "order created");

        // 4. Charge, then confirm or compensate
        let request = PaymentRequest {
            customer_id: order.customer_id.clone(),
            order_id: order.order_id.clone(),
            product_id: order.product_id.clone(),
            amount: order.amount,
        };
        match self.payments.submit(&request).await {
            Ok(receipt) if receipt.is_completed() => {
                self.confirm(&mut order, receipt.payment_id).await?;
                Ok(order)
            }
            Ok(receipt) => {
                let err = GatewayError::Rejected {
                    status: 200,
                    message: format!("Payment {} is {}", receipt.payment_id, receipt.status),
                };
                Err(self.compensate(order, err).await)
            }
            Err(err) => Err(self.compensate(order, err).await),
        }
    }

    async fn check_dependencies(
        &self,
        customer_id: &CustomerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability> {
        let (customer, product) = tokio::join!(
            self.inventory.get_customer(customer_id),
            self.inventory.get_product_availability(product_id, quantity),
        );

        customer.map_err(|err| match err {
            GatewayError::NotFound(_) => SagaError::CustomerNotFound(customer_id.clone()),
            other => SagaError::unavailable("Customer", other),
        })?;

        product.map_err(|err| match err {
            GatewayError::NotFound(_) => SagaError::ProductNotFound(product_id.clone()),
            other => SagaError::unavailable("Product", other),
        })
    }

    /// Records the payment on the pending order, then confirms it.
    ///
    /// Two writes: if the process dies between them the order stays pending
    /// with its payment ID, and the reconciler finishes the confirmation.
    async fn confirm(&self, order: &mut Order, payment_id: PaymentId) -> Result<()> {
        order.record_payment(payment_id)?;
        self.orders.update_order(order).await.inspect_err(|err| {
            tracing::error!(order_id = %order.order_id, error = %err, "failed to record payment on order");
        })?;

        order.confirm()?;
        self.orders.update_order(order).await.inspect_err(|err| {
            tracing::error!(order_id = %order.order_id, error = %err, "failed to confirm order");
        })?;

        metrics::counter!("orders_confirmed_total").increment(1);
        tracing::info!(
            order_id = %order.order_id,
            payment_id = ?order.payment_id,
            "order confirmed"
        );
        Ok(())
    }

    /// Cancels the order after a failed payment and builds the error returned
    /// to the caller.
    async fn compensate(&self, mut order: Order, err: GatewayError) -> SagaError {
        let (kind, reason) = match &err {
            GatewayError::Rejected { message, .. } => (PaymentFailureKind::Rejected, message.clone()),
            _ => (
                PaymentFailureKind::Unavailable,
                "Payment service unavailable".to_string(),
            ),
        };
        tracing::warn!(
            order_id = %order.order_id,
            error = %err,
            "payment failed, cancelling order"
        );

        if let Err(transition) = order.cancel() {
            return transition.into();
        }
        if let Err(store_err) = self.orders.update_order(&order).await {
            tracing::error!(
                order_id = %order.order_id,
                error = %store_err,
                "compensation failed, order left pending"
            );
            return store_err.into();
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        SagaError::PaymentFailed {
            order_id: order.order_id,
            order_status: order.status,
            reason,
            kind,
        }
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| SagaError::OrderNotFound(order_id.clone()))
    }

    /// Lists orders, newest first.
    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders(query).await?)
    }

    /// Applies an operator status change.
    ///
    /// Allowed: `pending → cancelled` for an order without a payment,
    /// `pending → confirmed` for an order whose payment is already recorded,
    /// and `confirmed → paid` (settlement).
    #[tracing::instrument(skip(self, command), fields(order_id = %command.order_id, status = %command.status))]
    pub async fn update_status(&self, command: UpdateOrderStatus) -> Result<Order> {
        let mut order = self.get_order(&command.order_id).await?;
        let previous = order.status;

        order.transition_to(command.status)?;
        self.orders.update_order(&order).await?;

        if order.status == domain::OrderStatus::Cancelled {
            metrics::counter!("orders_cancelled_total").increment(1);
        }
        tracing::info!(from = %previous, to = %order.status, "order status updated");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryInventoryGateway, InMemoryPaymentGateway};
    use domain::{Money, OrderStatus};
    use store::InMemoryStore;

    type Coordinator =
        OrderSagaCoordinator<InMemoryStore, InMemoryInventoryGateway, InMemoryPaymentGateway>;

    async fn setup() -> (
        Coordinator,
        InMemoryStore,
        InMemoryInventoryGateway,
        InMemoryPaymentGateway,
    ) {
        let store = InMemoryStore::new();
        let inventory = InMemoryInventoryGateway::new();
        let payments = InMemoryPaymentGateway::new();

        inventory.add_customer("C1").await;
        inventory
            .add_product("P1", 10, Money::from_decimal(99.99).unwrap())
            .await;

        let coordinator = OrderSagaCoordinator::new(store.clone(), inventory.clone(), payments.clone());
        (coordinator, store, inventory, payments)
    }

    #[tokio::test]
    async fn test_validation_failure_has_no_side_effects() {
        let (coordinator, store, inventory, payments) = setup().await;

        let result = coordinator
            .create_order(PlaceOrder::new("C1", "P1", 0))
            .await;

        assert!(matches!(result, Err(SagaError::Validation(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(inventory.customer_lookups().await, 0);
        assert_eq!(payments.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_both_lookups_run_even_when_customer_missing() {
        let (coordinator, store, inventory, payments) = setup().await;

        let result = coordinator
            .create_order(PlaceOrder::new("C404", "P1", 1))
            .await;

        assert!(matches!(result, Err(SagaError::CustomerNotFound(_))));
        assert_eq!(inventory.customer_lookups().await, 1);
        assert_eq!(inventory.product_lookups().await, 1);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(payments.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_compensation_leaves_order_pending() {
        let (coordinator, store, _inventory, payments) = setup().await;
        payments.set_decline(true).await;
        store.set_fail_order_updates(true).await;

        let result = coordinator
            .create_order(PlaceOrder::new("C1", "P1", 1))
            .await;
        assert!(matches!(result, Err(SagaError::Store(_))));

        store.set_fail_order_updates(false).await;
        let orders = coordinator.list_orders(&OrderQuery::new()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Pending);
        assert!(orders[0].payment_id.is_none());
    }

    #[tokio::test]
    async fn test_update_status_settles_confirmed_order() {
        let (coordinator, _store, _inventory, _payments) = setup().await;
        let order = coordinator
            .create_order(PlaceOrder::new("C1", "P1", 1))
            .await
            .unwrap();

        let paid = coordinator
            .update_status(UpdateOrderStatus::new(order.order_id.clone(), OrderStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_id, order.payment_id);

        let stored = coordinator.get_order(&order.order_id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let (coordinator, _store, _inventory, payments) = setup().await;
        payments.set_decline(true).await;
        let Err(SagaError::PaymentFailed { order_id, .. }) = coordinator
            .create_order(PlaceOrder::new("C1", "P1", 1))
            .await
        else {
            panic!("expected payment failure");
        };

        let result = coordinator
            .update_status(UpdateOrderStatus::new(order_id.clone(), OrderStatus::Paid))
            .await;
        assert!(matches!(result, Err(SagaError::InvalidTransition(_))));

        let stored = coordinator.get_order(&order_id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order() {
        let (coordinator, _store, _inventory, _payments) = setup().await;
        let result = coordinator
            .update_status(UpdateOrderStatus::new("ORDER-missing", OrderStatus::Cancelled))
            .await;
        assert!(matches!(result, Err(SagaError::OrderNotFound(_))));
    }
}

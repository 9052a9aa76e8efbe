use std::sync::Arc;

use async_trait::async_trait;
use domain::{Order, OrderId, Payment, PaymentId, Transaction, TransactionId};
use tokio::sync::RwLock;

use crate::{
    OrderQuery, OrderRepository, PaymentQuery, PaymentRepository, Recorded, Result, StoreError,
    TransactionQuery, TransactionRepository,
};

#[derive(Debug, Default)]
struct Tables {
    orders: Vec<Order>,
    payments: Vec<Payment>,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_order_inserts: bool,
    fail_order_updates: bool,
    fail_payment_writes: bool,
    failing_transaction_writes: u32,
}

/// In-memory store implementing every repository, for tests and local runs.
///
/// Clones share the same tables. Write failures can be injected to simulate
/// a store outage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every order insert fail until reset.
    pub async fn set_fail_order_inserts(&self, fail: bool) {
        self.faults.write().await.fail_order_inserts = fail;
    }

    /// Makes every order update fail until reset.
    pub async fn set_fail_order_updates(&self, fail: bool) {
        self.faults.write().await.fail_order_updates = fail;
    }

    /// Makes every payment write fail until reset.
    pub async fn set_fail_payment_writes(&self, fail: bool) {
        self.faults.write().await.fail_payment_writes = fail;
    }

    /// Makes the next `count` transaction writes fail.
    pub async fn fail_next_transaction_writes(&self, count: u32) {
        self.faults.write().await.failing_transaction_writes = count;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Returns the number of stored transactions.
    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.orders.clear();
        tables.payments.clear();
        tables.transactions.clear();
    }
}

fn unavailable(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure on {operation}"))
}

/// Sorts newest first; among equal timestamps, the later insert comes first.
fn newest_first<T: Clone>(
    rows: &[T],
    keep: impl Fn(&T) -> bool,
    created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Vec<T> {
    let mut selected: Vec<T> = rows.iter().rev().filter(|r| keep(r)).cloned().collect();
    selected.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    selected
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        if self.faults.read().await.fail_order_inserts {
            return Err(unavailable("insert_order"));
        }
        let mut tables = self.tables.write().await;
        if tables.orders.iter().any(|o| o.order_id == order.order_id) {
            return Err(StoreError::Conflict {
                entity: "order",
                id: order.order_id.to_string(),
            });
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        if self.faults.read().await.fail_order_updates {
            return Err(unavailable("update_order"));
        }
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .iter_mut()
            .find(|o| o.order_id == order.order_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order.order_id.to_string(),
            })?;
        stored.status = order.status;
        stored.payment_id = order.payment_id.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| &o.order_id == order_id)
            .cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders = newest_first(&tables.orders, |o| query.matches(o), |o| o.created_at);
        if let Some(limit) = query.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        if self.faults.read().await.fail_payment_writes {
            return Err(unavailable("insert_payment"));
        }
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .iter()
            .any(|p| p.payment_id == payment.payment_id)
        {
            return Err(StoreError::Conflict {
                entity: "payment",
                id: payment.payment_id.to_string(),
            });
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        if self.faults.read().await.fail_payment_writes {
            return Err(unavailable("update_payment"));
        }
        let mut tables = self.tables.write().await;
        let stored = tables
            .payments
            .iter_mut()
            .find(|p| p.payment_id == payment.payment_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                id: payment.payment_id.to_string(),
            })?;
        stored.status = payment.status;
        stored.updated_at = payment.updated_at;
        Ok(())
    }

    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| &p.payment_id == payment_id)
            .cloned())
    }

    async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            &tables.payments,
            |p| query.matches(p),
            |p| p.created_at,
        ))
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn record_transaction(&self, transaction: &Transaction) -> Result<Recorded> {
        {
            let mut faults = self.faults.write().await;
            if faults.failing_transaction_writes > 0 {
                faults.failing_transaction_writes -= 1;
                return Err(unavailable("record_transaction"));
            }
        }
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .transactions
            .iter()
            .find(|t| t.payment_id == transaction.payment_id)
        {
            return Ok(Recorded::Duplicate(existing.clone()));
        }
        tables.transactions.push(transaction.clone());
        Ok(Recorded::Inserted(transaction.clone()))
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .find(|t| &t.transaction_id == transaction_id)
            .cloned())
    }

    async fn find_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .find(|t| &t.payment_id == payment_id)
            .cloned())
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            &tables.transactions,
            |t| query.matches(t),
            |t| t.created_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{
        CustomerId, Money, OrderStatus, PaymentRequest, ProductId, TransactionIntent,
    };

    fn order(customer: &str) -> Order {
        Order::place(
            OrderId::generate(),
            CustomerId::new(customer),
            ProductId::new("P1"),
            2,
            Money::from_cents(500),
        )
        .unwrap()
    }

    fn transaction(payment_id: &str) -> Transaction {
        Transaction::completed(TransactionIntent {
            payment_id: PaymentId::new(payment_id),
            customer_id: CustomerId::new("C1"),
            order_id: OrderId::new("ORDER-1"),
            product_id: ProductId::new("P1"),
            amount: Money::from_cents(1000),
            timestamp: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_insert_and_get_order() {
        let store = InMemoryStore::new();
        let o = order("C1");
        store.insert_order(&o).await.unwrap();

        let loaded = store.get_order(&o.order_id).await.unwrap().unwrap();
        assert_eq!(loaded, o);
        assert!(
            store
                .get_order(&OrderId::new("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_order_insert_conflicts() {
        let store = InMemoryStore::new();
        let o = order("C1");
        store.insert_order(&o).await.unwrap();
        assert!(matches!(
            store.insert_order(&o).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_does_not_touch_amount() {
        let store = InMemoryStore::new();
        let mut o = order("C1");
        store.insert_order(&o).await.unwrap();

        o.amount = Money::from_cents(1);
        o.cancel().unwrap();
        store.update_order(&o).await.unwrap();

        let loaded = store.get_order(&o.order_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Cancelled);
        assert_eq!(loaded.amount, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.update_order(&order("C1")).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_with_filters() {
        let store = InMemoryStore::new();
        let first = order("C1");
        let second = order("C2");
        let mut third = order("C1");
        store.insert_order(&first).await.unwrap();
        store.insert_order(&second).await.unwrap();
        third.cancel().unwrap();
        store.insert_order(&third).await.unwrap();

        let all = store.list_orders(&OrderQuery::new()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|o| o.order_id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                third.order_id.clone(),
                second.order_id.clone(),
                first.order_id.clone()
            ]
        );

        let c1 = store
            .list_orders(&OrderQuery::new().customer("C1"))
            .await
            .unwrap();
        assert_eq!(c1.len(), 2);

        let cancelled = store
            .list_orders(
                &OrderQuery::new()
                    .customer("C1")
                    .status(OrderStatus::Cancelled),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].order_id, third.order_id);
    }

    #[tokio::test]
    async fn test_injected_order_update_failure() {
        let store = InMemoryStore::new();
        let mut o = order("C1");
        store.insert_order(&o).await.unwrap();
        store.set_fail_order_updates(true).await;

        o.cancel().unwrap();
        let err = store.update_order(&o).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_record_transaction_is_idempotent_by_payment() {
        let store = InMemoryStore::new();
        let first = store
            .record_transaction(&transaction("PAY-1"))
            .await
            .unwrap();
        assert!(first.is_inserted());

        let second = store
            .record_transaction(&transaction("PAY-1"))
            .await
            .unwrap();
        assert!(!second.is_inserted());
        assert_eq!(
            second.transaction().transaction_id,
            first.transaction().transaction_id
        );
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_transaction_write_failures_count_down() {
        let store = InMemoryStore::new();
        store.fail_next_transaction_writes(2).await;

        assert!(store.record_transaction(&transaction("PAY-1")).await.is_err());
        assert!(store.record_transaction(&transaction("PAY-1")).await.is_err());
        assert!(store.record_transaction(&transaction("PAY-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_payment_filters() {
        let store = InMemoryStore::new();
        let mut payment = Payment::initiate(
            PaymentId::new("PAY-1"),
            PaymentRequest {
                customer_id: CustomerId::new("C1"),
                order_id: OrderId::new("ORDER-1"),
                product_id: ProductId::new("P1"),
                amount: Money::from_cents(100),
            },
        );
        store.insert_payment(&payment).await.unwrap();
        payment.complete().unwrap();
        store.update_payment(&payment).await.unwrap();

        let found = store
            .list_payments(&PaymentQuery::for_order("ORDER-1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, domain::PaymentStatus::Completed);
        assert!(
            store
                .list_payments(&PaymentQuery::for_order("ORDER-2"))
                .await
                .unwrap()
                .is_empty()
        );
    }
}

use std::str::FromStr;

use async_trait::async_trait;
use domain::{
    CustomerId, Money, Order, OrderId, OrderStatus, Payment, PaymentId, PaymentStatus, ProductId,
    Transaction, TransactionId, TransactionStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    OrderQuery, OrderRepository, PaymentQuery, PaymentRepository, Recorded, Result, StoreError,
    TransactionQuery, TransactionRepository,
};

const ORDER_COLUMNS: &str = "order_id, customer_id, product_id, quantity, amount_cents, status, payment_id, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "payment_id, customer_id, order_id, product_id, amount_cents, status, payment_method, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "transaction_id, payment_id, customer_id, order_id, product_id, amount_cents, status, processed_at, created_at";

/// PostgreSQL-backed store implementing every repository.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn parse_status<T: FromStr>(entity: &'static str, raw: &str) -> Result<T> {
        raw.parse().map_err(|_| StoreError::Corrupt {
            entity,
            reason: format!("unknown status '{raw}'"),
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let quantity: i32 = row.try_get("quantity")?;
        let status: String = row.try_get("status")?;
        Ok(Order {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: u32::try_from(quantity).map_err(|_| StoreError::Corrupt {
                entity: "order",
                reason: format!("negative quantity {quantity}"),
            })?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status: Self::parse_status::<OrderStatus>("order", &status)?,
            payment_id: row
                .try_get::<Option<String>, _>("payment_id")?
                .map(PaymentId::new),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        Ok(Payment {
            payment_id: PaymentId::new(row.try_get::<String, _>("payment_id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status: Self::parse_status::<PaymentStatus>("payment", &status)?,
            payment_method: row.try_get("payment_method")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let status: String = row.try_get("status")?;
        Ok(Transaction {
            transaction_id: TransactionId::new(row.try_get::<String, _>("transaction_id")?),
            payment_id: PaymentId::new(row.try_get::<String, _>("payment_id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status: Self::parse_status::<TransactionStatus>("transaction", &status)?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn map_insert_error(entity: &'static str, id: &str, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return StoreError::Conflict {
                entity,
                id: id.to_string(),
            };
        }
        StoreError::Database(err)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let quantity = i32::try_from(order.quantity).map_err(|_| StoreError::Corrupt {
            entity: "order",
            reason: format!("quantity {} out of range", order.quantity),
        })?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, customer_id, product_id, quantity, amount_cents, status, payment_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.customer_id.as_str())
        .bind(order.product_id.as_str())
        .bind(quantity)
        .bind(order.amount.cents())
        .bind(order.status.as_str())
        .bind(order.payment_id.as_ref().map(|p| p.as_str()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error("order", order.order_id.as_str(), e))?;

        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_id = $3, updated_at = $4
            WHERE order_id = $1
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_id.as_ref().map(|p| p.as_str()))
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.order_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(customer_id) = &query.customer_id {
            sqlx_query = sqlx_query.bind(customer_id.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(before) = query.created_before {
            sqlx_query = sqlx_query.bind(before);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, customer_id, order_id, product_id, amount_cents, status, payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.payment_id.as_str())
        .bind(payment.customer_id.as_str())
        .bind(payment.order_id.as_str())
        .bind(payment.product_id.as_str())
        .bind(payment.amount.cents())
        .bind(payment.status.as_str())
        .bind(&payment.payment_method)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error("payment", payment.payment_id.as_str(), e))?;

        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = $3 WHERE payment_id = $1",
        )
        .bind(payment.payment_id.as_str())
        .bind(payment.status.as_str())
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "payment",
                id: payment.payment_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>> {
        let mut sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1=1");
        let mut param_count = 0;

        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(customer_id) = &query.customer_id {
            sqlx_query = sqlx_query.bind(customer_id.as_str());
        }
        if let Some(order_id) = &query.order_id {
            sqlx_query = sqlx_query.bind(order_id.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_payment).collect()
    }
}

#[async_trait]
impl TransactionRepository for PostgresStore {
    async fn record_transaction(&self, transaction: &Transaction) -> Result<Recorded> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO transactions ({TRANSACTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (payment_id) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.transaction_id.as_str())
        .bind(transaction.payment_id.as_str())
        .bind(transaction.customer_id.as_str())
        .bind(transaction.order_id.as_str())
        .bind(transaction.product_id.as_str())
        .bind(transaction.amount.cents())
        .bind(transaction.status.as_str())
        .bind(transaction.processed_at)
        .bind(transaction.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(Recorded::Inserted(Self::row_to_transaction(row)?));
        }

        let existing = self
            .find_by_payment(&transaction.payment_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt {
                entity: "transaction",
                reason: format!(
                    "conflict on payment {} but no row found",
                    transaction.payment_id
                ),
            })?;
        tracing::debug!(
            payment_id = %transaction.payment_id,
            transaction_id = %existing.transaction_id,
            "transaction already recorded"
        );
        Ok(Recorded::Duplicate(existing))
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1"
        ))
        .bind(transaction_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn find_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE payment_id = $1"
        ))
        .bind(payment_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1=1");
        let mut param_count = 0;

        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.payment_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(customer_id) = &query.customer_id {
            sqlx_query = sqlx_query.bind(customer_id.as_str());
        }
        if let Some(order_id) = &query.order_id {
            sqlx_query = sqlx_query.bind(order_id.as_str());
        }
        if let Some(payment_id) = &query.payment_id {
            sqlx_query = sqlx_query.bind(payment_id.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}

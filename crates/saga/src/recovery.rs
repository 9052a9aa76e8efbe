//! Crash recovery for orders stuck in `pending`.
//!
//! The saga writes the gateway's payment ID onto the pending order before
//! confirming it. If the process dies anywhere between the order insert and
//! the final status write, the order is left pending. The reconciler finishes
//! those orders: a recorded payment ID means the charge went through, so the
//! order is confirmed; otherwise the payment service is asked whether a
//! completed payment exists for the order.

use std::future::Future;

use chrono::{Duration, Utc};
use domain::{Order, OrderId, OrderStatus};
use store::{OrderQuery, OrderRepository};

use crate::clients::PaymentGateway;
use crate::error::Result;

/// Outcome of a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    /// Orders moved to `confirmed`.
    pub confirmed: Vec<OrderId>,

    /// Orders moved to `cancelled`.
    pub cancelled: Vec<OrderId>,

    /// Orders left pending because the payment service could not be asked
    /// or the write failed. They are retried on the next pass.
    pub skipped: Vec<OrderId>,
}

impl ReconcileReport {
    /// Returns the number of orders examined.
    pub fn examined(&self) -> usize {
        self.confirmed.len() + self.cancelled.len() + self.skipped.len()
    }
}

enum Resolution {
    Confirmed,
    Cancelled,
}

/// Resolves pending orders older than a cutoff.
pub struct OrderReconciler<R, P>
where
    R: OrderRepository,
    P: PaymentGateway,
{
    orders: R,
    payments: P,
    stale_after: Duration,
    batch_size: usize,
}

impl<R, P> OrderReconciler<R, P>
where
    R: OrderRepository,
    P: PaymentGateway,
{
    /// Creates a reconciler that only touches orders pending for longer than
    /// `stale_after`, so in-flight sagas are left alone.
    pub fn new(orders: R, payments: P, stale_after: Duration) -> Self {
        Self {
            orders,
            payments,
            stale_after,
            batch_size: 100,
        }
    }

    /// Caps the number of orders examined per pass.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Runs a pass every `interval` until `shutdown` resolves. A failed pass
    /// is logged and retried on the next tick.
    pub async fn run<F>(&self, interval: std::time::Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        tracing::warn!(error = %err, "reconciliation pass failed");
                    }
                }
            }
        }
        tracing::info!("reconciler stopped");
    }

    /// Runs one pass over stale pending orders.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        let cutoff = Utc::now() - self.stale_after;
        let stale = self
            .orders
            .list_orders(
                &OrderQuery::new()
                    .status(OrderStatus::Pending)
                    .created_before(cutoff)
                    .limit(self.batch_size),
            )
            .await?;

        let mut report = ReconcileReport::default();
        for order in stale {
            let order_id = order.order_id.clone();
            match self.resolve(order).await {
                Ok(Some(Resolution::Confirmed)) => report.confirmed.push(order_id),
                Ok(Some(Resolution::Cancelled)) => report.cancelled.push(order_id),
                Ok(None) => report.skipped.push(order_id),
                Err(err) => {
                    tracing::warn!(%order_id, error = %err, "failed to reconcile order");
                    report.skipped.push(order_id);
                }
            }
        }

        if report.examined() > 0 {
            tracing::info!(
                confirmed = report.confirmed.len(),
                cancelled = report.cancelled.len(),
                skipped = report.skipped.len(),
                "reconciliation pass finished"
            );
        }
        Ok(report)
    }

    async fn resolve(&self, mut order: Order) -> Result<Option<Resolution>> {
        if order.payment_id.is_none() {
            match self.payments.find_payment_for_order(&order.order_id).await {
                Ok(Some(receipt)) => order.record_payment(receipt.payment_id)?,
                Ok(None) => {
                    order.cancel()?;
                    self.orders.update_order(&order).await?;
                    metrics::counter!("orders_cancelled_total").increment(1);
                    tracing::info!(order_id = %order.order_id, "no payment found, order cancelled");
                    return Ok(Some(Resolution::Cancelled));
                }
                Err(err) => {
                    tracing::warn!(
                        order_id = %order.order_id,
                        error = %err,
                        "payment lookup failed, leaving order pending"
                    );
                    return Ok(None);
                }
            }
        }

        order.confirm()?;
        self.orders.update_order(&order).await?;
        metrics::counter!("orders_confirmed_total").increment(1);
        tracing::info!(
            order_id = %order.order_id,
            payment_id = ?order.payment_id,
            "recovered order confirmed"
        );
        Ok(Some(Resolution::Confirmed))
    }
}

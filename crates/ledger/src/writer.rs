//! Turns transaction-intent messages into ledger records.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use backon::{BackoffBuilder, ExponentialBuilder};
use domain::{PaymentId, Transaction, TransactionIntent};
use store::{Recorded, TransactionRepository};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::AmqpConfig;
use crate::error::LedgerError;

/// Failed payments tracked at once; the oldest entry is evicted beyond this.
const MAX_TRACKED_ATTEMPTS: usize = 10_000;

/// A tracked payment not seen again for this long is forgotten.
const ATTEMPT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct Attempts {
    deliveries: u32,
    last_seen: Instant,
}

/// What to do with a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Recorded (or already recorded); remove from the queue.
    Ack,

    /// Transient failure; wait `delay`, then return the message to the queue.
    Requeue { delay: Duration },

    /// Poison or exhausted; remove without requeue so the broker
    /// dead-letters it.
    Reject,
}

/// Records one transaction per payment.
///
/// Recording is an upsert keyed by payment ID, so redelivered messages are
/// acknowledged without writing a second row. Store failures are retried by
/// requeueing until the message has been delivered `max_deliveries` times.
///
/// Delivery counts live in a bounded map. Entries for messages settled
/// elsewhere (another worker, a purge) expire after a while.
pub struct LedgerWriter<S: TransactionRepository> {
    store: S,
    max_deliveries: u32,
    backoff: ExponentialBuilder,
    attempts: Mutex<HashMap<PaymentId, Attempts>>,
    attempt_ttl: Duration,
    attempt_capacity: usize,
}

impl<S: TransactionRepository> LedgerWriter<S> {
    /// Creates a writer with the retry limits from `config`.
    pub fn new(store: S, config: &AmqpConfig) -> Self {
        Self {
            store,
            max_deliveries: config.max_deliveries.max(1),
            backoff: ExponentialBuilder::default()
                .with_min_delay(config.retry_min_delay)
                .with_max_delay(config.retry_max_delay)
                .with_max_times(config.max_deliveries as usize),
            attempts: Mutex::new(HashMap::new()),
            attempt_ttl: ATTEMPT_TTL,
            attempt_capacity: MAX_TRACKED_ATTEMPTS,
        }
    }

    /// Returns the repository.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decodes and validates a message payload.
    pub fn decode(payload: &[u8]) -> Result<TransactionIntent, LedgerError> {
        let intent: TransactionIntent = serde_json::from_slice(payload)
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        intent
            .validate()
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(intent)
    }

    /// Processes one delivery and decides how to settle it.
    ///
    /// `redelivered` is the broker's flag; it counts as one earlier delivery
    /// when this process has not seen the payment before.
    pub async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition {
        let intent = match Self::decode(payload) {
            Ok(intent) => intent,
            Err(err) => {
                warn!(error = %err, "rejecting malformed transaction message");
                metrics::counter!("ledger_messages_total", "outcome" => "malformed").increment(1);
                return Disposition::Reject;
            }
        };
        let payment_id = intent.payment_id.clone();

        match self
            .store
            .record_transaction(&Transaction::completed(intent))
            .await
        {
            Ok(recorded) => {
                self.attempts.lock().await.remove(&payment_id);
                let tx = recorded.transaction();
                match recorded {
                    Recorded::Inserted(_) => {
                        metrics::counter!("ledger_messages_total", "outcome" => "recorded")
                            .increment(1);
                        info!(
                            transaction_id = %tx.transaction_id,
                            %payment_id,
                            order_id = %tx.order_id,
                            "transaction recorded"
                        );
                    }
                    Recorded::Duplicate(_) => {
                        metrics::counter!("ledger_messages_total", "outcome" => "duplicate")
                            .increment(1);
                        info!(
                            transaction_id = %tx.transaction_id,
                            %payment_id,
                            "transaction already recorded, acknowledging redelivery"
                        );
                    }
                }
                Disposition::Ack
            }
            Err(err) => self.on_store_failure(payment_id, redelivered, err).await,
        }
    }

    async fn on_store_failure(
        &self,
        payment_id: PaymentId,
        redelivered: bool,
        err: store::StoreError,
    ) -> Disposition {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, a| now.duration_since(a.last_seen) < self.attempt_ttl);
        if !attempts.contains_key(&payment_id) && attempts.len() >= self.attempt_capacity {
            let oldest = attempts
                .iter()
                .min_by_key(|(_, a)| a.last_seen)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                attempts.remove(&oldest);
            }
        }

        let seen = attempts.entry(payment_id.clone()).or_insert(Attempts {
            deliveries: u32::from(redelivered),
            last_seen: now,
        });
        seen.deliveries += 1;
        seen.last_seen = now;
        let deliveries = seen.deliveries;

        if deliveries >= self.max_deliveries {
            attempts.remove(&payment_id);
            metrics::counter!("ledger_messages_total", "outcome" => "dead_lettered").increment(1);
            error!(
                %payment_id,
                deliveries,
                error = %err,
                "giving up on transaction message, dead-lettering"
            );
            return Disposition::Reject;
        }

        let delay = self
            .backoff
            .build()
            .nth(deliveries as usize - 1)
            .unwrap_or(Duration::ZERO);
        metrics::counter!("ledger_messages_total", "outcome" => "requeued").increment(1);
        warn!(
            %payment_id,
            deliveries,
            max_deliveries = self.max_deliveries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "failed to record transaction, requeueing"
        );
        Disposition::Requeue { delay }
    }
}

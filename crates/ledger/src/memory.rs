use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use domain::TransactionIntent;
use store::TransactionRepository;
use tokio::sync::RwLock;

use crate::error::{LedgerError, Result};
use crate::publisher::TransactionPublisher;
use crate::writer::{Disposition, LedgerWriter};

/// A message waiting in the in-memory queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    dead_letters: Vec<QueuedMessage>,
    published: usize,
    acked: usize,
    fail_publishes: bool,
}

/// In-memory broker with the same settle semantics as the durable queue:
/// acked messages leave, requeued ones return to the back flagged as
/// redelivered, rejected ones move to the dead-letter list.
///
/// Requeue delays are not slept.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<RwLock<QueueState>>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail until reset.
    pub async fn set_fail_publishes(&self, fail: bool) {
        self.state.write().await.fail_publishes = fail;
    }

    /// Enqueues a raw payload, bypassing serialization.
    pub async fn push_raw(&self, payload: impl Into<Vec<u8>>) {
        self.state.write().await.ready.push_back(QueuedMessage {
            payload: payload.into(),
            redelivered: false,
        });
    }

    /// Returns the number of messages accepted by `publish`.
    pub async fn published_count(&self) -> usize {
        self.state.read().await.published
    }

    /// Returns the number of messages waiting for delivery.
    pub async fn ready_count(&self) -> usize {
        self.state.read().await.ready.len()
    }

    /// Returns the number of acknowledged messages.
    pub async fn acked_count(&self) -> usize {
        self.state.read().await.acked
    }

    /// Returns the dead-lettered messages.
    pub async fn dead_letters(&self) -> Vec<QueuedMessage> {
        self.state.read().await.dead_letters.clone()
    }

    /// Delivers the next message to `writer` and settles it.
    ///
    /// Returns `None` when the queue is empty.
    pub async fn deliver_next<S: TransactionRepository>(
        &self,
        writer: &LedgerWriter<S>,
    ) -> Option<Disposition> {
        let message = self.state.write().await.ready.pop_front()?;
        let disposition = writer.handle(&message.payload, message.redelivered).await;

        let mut state = self.state.write().await;
        match disposition {
            Disposition::Ack => state.acked += 1,
            Disposition::Requeue { .. } => state.ready.push_back(QueuedMessage {
                redelivered: true,
                ..message
            }),
            Disposition::Reject => state.dead_letters.push(message),
        }
        Some(disposition)
    }

    /// Delivers messages until the queue is empty or `max_deliveries`
    /// deliveries have been made. Returns the number of deliveries.
    pub async fn drain<S: TransactionRepository>(
        &self,
        writer: &LedgerWriter<S>,
        max_deliveries: usize,
    ) -> usize {
        let mut delivered = 0;
        while delivered < max_deliveries && self.deliver_next(writer).await.is_some() {
            delivered += 1;
        }
        delivered
    }
}

#[async_trait]
impl TransactionPublisher for InMemoryQueue {
    async fn publish(&self, intent: &TransactionIntent) -> Result<()> {
        let payload = serde_json::to_vec(intent)
            .map_err(|e| LedgerError::Malformed(format!("Failed to encode intent: {e}")))?;

        let mut state = self.state.write().await;
        if state.fail_publishes {
            return Err(LedgerError::Publish("injected publish failure".into()));
        }
        state.ready.push_back(QueuedMessage {
            payload,
            redelivered: false,
        });
        state.published += 1;
        Ok(())
    }
}

//! Durable queue publisher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use domain::TransactionIntent;
use lapin::BasicProperties;
use lapin::options::BasicPublishOptions;
use tracing::{debug, warn};

use crate::connection::AmqpConnection;
use crate::error::{LedgerError, Result};

/// Persistent delivery mode: the broker writes the message to disk.
const PERSISTENT: u8 = 2;

/// Hands transaction intents to the durable queue.
///
/// A returned error means the broker did not confirm the message. Callers
/// treat it as a lost ledger entry, never as a reason to undo the payment.
#[async_trait]
pub trait TransactionPublisher: Send + Sync {
    /// Publishes one intent.
    async fn publish(&self, intent: &TransactionIntent) -> Result<()>;
}

#[async_trait]
impl<T: TransactionPublisher + ?Sized> TransactionPublisher for Arc<T> {
    async fn publish(&self, intent: &TransactionIntent) -> Result<()> {
        (**self).publish(intent).await
    }
}

/// Publishes intents to the transaction queue over AMQP.
pub struct AmqpPublisher {
    connection: AmqpConnection,
    max_retries: usize,
}

impl AmqpPublisher {
    /// Creates a publisher owning `connection`. Nothing is opened until the
    /// first publish.
    pub fn new(connection: AmqpConnection) -> Self {
        Self {
            connection,
            max_retries: 2,
        }
    }

    /// Closes the underlying connection.
    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    async fn publish_once(&self, payload: &[u8]) -> Result<()> {
        let channel = self.connection.channel().await?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT);

        let confirm = channel
            .basic_publish(
                "",
                &self.connection.config().queue,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| LedgerError::Publish(format!("Failed to publish: {e}")))?;

        let confirmation = confirm
            .await
            .map_err(|e| LedgerError::Publish(format!("Publish confirmation failed: {e}")))?;
        if confirmation.is_nack() {
            return Err(LedgerError::Publish("Broker rejected message".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionPublisher for AmqpPublisher {
    #[tracing::instrument(name = "ledger.publish", skip_all, fields(payment_id = %intent.payment_id))]
    async fn publish(&self, intent: &TransactionIntent) -> Result<()> {
        let payload = serde_json::to_vec(intent)
            .map_err(|e| LedgerError::Malformed(format!("Failed to encode intent: {e}")))?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries)
            .with_jitter()
            .build();

        let mut last_error = None;
        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(backoff).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }

            match self.publish_once(&payload).await {
                Ok(()) => {
                    debug!(queue = %self.connection.config().queue, "published transaction intent");
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "publish failed"
                    );
                    self.connection.invalidate().await;
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LedgerError::Publish("Max retries exceeded".into())))
    }
}

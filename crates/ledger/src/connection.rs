//! Explicitly owned, lazily connected broker connection.

use lapin::options::{ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::AmqpConfig;
use crate::error::{LedgerError, Result};

struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// A broker connection with its channel, owned by a publisher or consumer.
///
/// Nothing is opened until [`AmqpConnection::channel`] is first called. The
/// first call also declares the queue topology. After any error the owner
/// calls [`AmqpConnection::invalidate`]; the next `channel` call reconnects.
pub struct AmqpConnection {
    config: AmqpConfig,
    link: Mutex<Option<Link>>,
}

impl AmqpConnection {
    /// Creates an unconnected handle.
    pub fn new(config: AmqpConfig) -> Self {
        Self {
            config,
            link: Mutex::new(None),
        }
    }

    /// Returns the broker configuration.
    pub fn config(&self) -> &AmqpConfig {
        &self.config
    }

    /// Returns an open channel, connecting first if needed.
    pub async fn channel(&self) -> Result<Channel> {
        let mut link = self.link.lock().await;
        if let Some(existing) = link.as_ref()
            && existing.is_open()
        {
            return Ok(existing.channel.clone());
        }
        if link.take().is_some() {
            debug!("cached broker connection is closed, reconnecting");
        }

        let fresh = self.open().await?;
        let channel = fresh.channel.clone();
        *link = Some(fresh);
        Ok(channel)
    }

    /// Drops the cached connection so the next call reconnects.
    pub async fn invalidate(&self) {
        if let Some(stale) = self.link.lock().await.take() {
            if let Err(err) = stale.connection.close(0, "reconnecting").await {
                debug!(error = %err, "error closing stale broker connection");
            }
        }
    }

    /// Closes the connection, if open.
    pub async fn close(&self) -> Result<()> {
        if let Some(link) = self.link.lock().await.take()
            && link.connection.status().connected()
        {
            link.connection.close(200, "shutting down").await?;
            info!("broker connection closed");
        }
        Ok(())
    }

    async fn open(&self) -> Result<Link> {
        let connection = Connection::connect(&self.config.url, ConnectionProperties::default())
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to connect: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to create channel: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to enable confirms: {e}")))?;

        if let Err(err) = self.declare_topology(&channel).await {
            warn!(error = %err, queue = %self.config.queue, "queue declaration failed");
            let _ = connection.close(0, "topology error").await;
            return Err(err);
        }

        info!(queue = %self.config.queue, "connected to broker");
        Ok(Link {
            connection,
            channel,
        })
    }

    /// Declares the dead-letter queue and the transaction queue routed to it.
    async fn declare_topology(&self, channel: &Channel) -> Result<()> {
        let durable = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };
        let dead_letter_queue = self.config.dead_letter_queue();

        channel
            .queue_declare(&dead_letter_queue, durable, FieldTable::default())
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to declare queue: {e}")))?;

        channel
            .queue_declare(&self.config.queue, durable, dead_letter_args(&dead_letter_queue))
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to declare queue: {e}")))?;

        Ok(())
    }
}

/// Queue arguments routing rejected messages through the default exchange to
/// `dead_letter_queue`.
fn dead_letter_args(dead_letter_queue: &str) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString("".into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(dead_letter_queue.into()),
    );
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::ShortString;

    #[test]
    fn test_dead_letter_args() {
        let args = dead_letter_args("transaction_queue.dlq");
        let inner = args.inner();
        assert_eq!(inner.len(), 2);
        assert_eq!(
            inner.get(&ShortString::from("x-dead-letter-routing-key")),
            Some(&AMQPValue::LongString("transaction_queue.dlq".into()))
        );
    }

    #[tokio::test]
    async fn test_new_handle_does_not_connect() {
        let connection = AmqpConnection::new(AmqpConfig::default());
        assert!(connection.link.lock().await.is_none());
        connection.close().await.unwrap();
    }
}

//! Long-running AMQP consumer feeding the ledger writer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use store::TransactionRepository;
use tracing::{Instrument, error, info};

use crate::connection::AmqpConnection;
use crate::error::Result;
use crate::writer::{Disposition, LedgerWriter};

const CONSUMER_TAG: &str = "transaction-worker";
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

enum StreamEnd {
    Shutdown,
    Lost,
}

/// Consumes the transaction queue, one message at a time, until shut down.
pub struct LedgerConsumer<S: TransactionRepository> {
    connection: AmqpConnection,
    writer: LedgerWriter<S>,
}

impl<S: TransactionRepository> LedgerConsumer<S> {
    /// Creates a consumer owning its own broker connection.
    pub fn new(connection: AmqpConnection, writer: LedgerWriter<S>) -> Self {
        Self { connection, writer }
    }

    /// Runs until `shutdown` resolves, reconnecting with exponential backoff
    /// whenever the broker connection is lost. Closes the connection on exit.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let backoff_builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(MAX_RECONNECT_DELAY)
            .with_jitter();
        let mut backoff = backoff_builder.build();

        loop {
            match self.subscribe().await {
                Ok(mut consumer) => {
                    info!(queue = %self.connection.config().queue, "consumer connected, processing messages");
                    backoff = backoff_builder.build();

                    let end = loop {
                        let next = tokio::select! {
                            () = &mut shutdown => break StreamEnd::Shutdown,
                            next = consumer.next() => next,
                        };
                        match next {
                            Some(Ok(delivery)) => {
                                if self.process(delivery, shutdown.as_mut()).await {
                                    break StreamEnd::Shutdown;
                                }
                            }
                            Some(Err(err)) => {
                                error!(error = %err, "consumer delivery error, will reconnect");
                                break StreamEnd::Lost;
                            }
                            None => {
                                info!("consumer stream ended, reconnecting");
                                break StreamEnd::Lost;
                            }
                        }
                    };
                    if let StreamEnd::Shutdown = end {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "failed to set up consumer, retrying after backoff");
                }
            }

            self.connection.invalidate().await;
            let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("consumer shutting down");
        self.connection.close().await
    }

    async fn subscribe(&self) -> Result<lapin::Consumer> {
        let channel = self.connection.channel().await?;
        channel
            .basic_qos(self.connection.config().prefetch, BasicQosOptions::default())
            .await?;
        let consumer = channel
            .basic_consume(
                &self.connection.config().queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    /// Settles one delivery. Returns true if `shutdown` fired during a
    /// requeue backoff; the message is then requeued without waiting.
    async fn process<F>(&self, delivery: Delivery, shutdown: Pin<&mut F>) -> bool
    where
        F: Future<Output = ()>,
    {
        let span = tracing::info_span!(
            "ledger.consume",
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered
        );
        async {
            let disposition = self
                .writer
                .handle(&delivery.data, delivery.redelivered)
                .await;

            let mut interrupted = false;
            let settled = match disposition {
                Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
                Disposition::Requeue { delay } => {
                    interrupted = sleep_or_shutdown(delay, shutdown).await;
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await
                }
                Disposition::Reject => {
                    delivery
                        .reject(BasicRejectOptions { requeue: false })
                        .await
                }
            };
            if let Err(err) = settled {
                error!(error = %err, ?disposition, "failed to settle delivery");
            }
            interrupted
        }
        .instrument(span)
        .await
    }
}

/// Waits `delay` unless `shutdown` resolves first. Returns true on shutdown.
async fn sleep_or_shutdown<F>(delay: Duration, shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = shutdown => true,
        () = tokio::time::sleep(delay) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requeue_backoff_yields_to_shutdown() {
        let shutdown = std::future::ready(());
        tokio::pin!(shutdown);

        let interrupted = tokio::time::timeout(
            Duration::from_secs(1),
            sleep_or_shutdown(Duration::from_secs(60), shutdown.as_mut()),
        )
        .await
        .expect("backoff should end on shutdown");
        assert!(interrupted);
    }

    #[tokio::test]
    async fn test_requeue_backoff_completes_without_shutdown() {
        let shutdown = std::future::pending::<()>();
        tokio::pin!(shutdown);

        assert!(!sleep_or_shutdown(Duration::from_millis(5), shutdown.as_mut()).await);
    }
}

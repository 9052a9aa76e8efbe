//! Ledger worker entry point.

use api::config::Config;
use api::telemetry;
use ledger::{AmqpConnection, LedgerConsumer, LedgerWriter};
use store::{InMemoryStore, PostgresStore, TransactionRepository};

#[tokio::main]
async fn main() {
    let config = Config::worker_from_env();
    telemetry::init_tracing(&config);

    let metrics_addr: std::net::SocketAddr = config
        .addr()
        .parse()
        .expect("HOST and PORT must form a socket address");
    telemetry::install_metrics_listener(metrics_addr)
        .expect("failed to install Prometheus exporter");

    let result = match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            consume(&config, store).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, transactions are kept in memory");
            consume(&config, InMemoryStore::new()).await
        }
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "transaction worker stopped with an error");
        std::process::exit(1);
    }
    tracing::info!("transaction worker shut down gracefully");
}

async fn consume<S: TransactionRepository>(config: &Config, store: S) -> ledger::Result<()> {
    let writer = LedgerWriter::new(store, &config.amqp);
    let consumer = LedgerConsumer::new(AmqpConnection::new(config.amqp.clone()), writer);

    tracing::info!(
        queue = %config.amqp.queue,
        max_deliveries = config.amqp.max_deliveries,
        "starting transaction worker"
    );
    consumer.run(telemetry::shutdown_signal()).await
}

//! Payment service entry point.

use std::sync::Arc;

use api::config::Config;
use api::routes::payments::PaymentState;
use api::telemetry;
use ledger::{AmqpConnection, AmqpPublisher, TransactionPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{ApprovalStrategy, PaymentProcessor, RandomApproval};
use store::{InMemoryStore, PaymentRepository, PostgresStore, TransactionRepository};

#[tokio::main]
async fn main() {
    let config = Config::payment_service_from_env();
    telemetry::init_tracing(&config);

    let metrics_handle = telemetry::install_metrics().expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory");
            serve(config, InMemoryStore::new(), metrics_handle).await;
        }
    }
}

async fn serve<S>(config: Config, store: S, metrics_handle: PrometheusHandle)
where
    S: PaymentRepository + TransactionRepository + Clone + 'static,
{
    // The broker connection opens lazily on the first completed payment.
    let publisher = Arc::new(AmqpPublisher::new(AmqpConnection::new(config.amqp.clone())));
    let approval: Arc<dyn ApprovalStrategy> = Arc::new(RandomApproval::new(config.approval_rate));
    let processor = PaymentProcessor::new(
        store.clone(),
        approval,
        Arc::clone(&publisher) as Arc<dyn TransactionPublisher>,
    );

    let state = Arc::new(PaymentState {
        processor,
        ledger: store,
    });
    let app = api::create_payment_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, queue = %config.amqp.queue, "starting payment service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await
        .expect("server error");

    if let Err(err) = publisher.close().await {
        tracing::warn!(error = %err, "failed to close broker connection");
    }
    tracing::info!("server shut down gracefully");
}

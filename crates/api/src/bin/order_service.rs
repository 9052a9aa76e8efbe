//! Order service entry point.

use std::sync::Arc;

use api::config::Config;
use api::routes::orders::OrderState;
use api::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    HttpInventoryGateway, HttpPaymentGateway, InventoryGateway, OrderReconciler, PaymentGateway,
};
use store::{InMemoryStore, OrderRepository, PostgresStore};

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    telemetry::init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = telemetry::install_metrics().expect("failed to install Prometheus recorder");

    // 3. Pick the order store
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
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            serve(config, InMemoryStore::new(), metrics_handle).await;
        }
    }
}

async fn serve<S>(config: Config, store: S, metrics_handle: PrometheusHandle)
where
    S: OrderRepository + Clone + 'static,
{
    // 4. Gateway clients
    let policy = config.retry_policy();
    let inventory: Arc<dyn InventoryGateway> = Arc::new(
        HttpInventoryGateway::new(
            config.customer_service_url.as_str(),
            config.product_service_url.as_str(),
            policy.clone(),
        )
        .expect("failed to build inventory client"),
    );
    let payments: Arc<dyn PaymentGateway> = Arc::new(
        HttpPaymentGateway::new(config.payment_service_url.as_str(), policy)
            .expect("failed to build payment client"),
    );

    // 5. Background reconciliation of stuck orders
    let stale_after =
        chrono::Duration::from_std(config.stale_after).expect("ORDER_STALE_AFTER_SECS out of range");
    let reconciler = OrderReconciler::new(store.clone(), Arc::clone(&payments), stale_after);
    let (stop_reconciler, stopped) = tokio::sync::oneshot::channel::<()>();
    let interval = config.reconcile_interval;
    let reconcile_task = tokio::spawn(async move {
        reconciler
            .run(interval, async {
                let _ = stopped.await;
            })
            .await;
    });

    // 6. Build the application
    let state = Arc::new(OrderState::new(store, inventory, payments));
    let app = api::create_order_app(state, metrics_handle);

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting order service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await
        .expect("server error");

    let _ = stop_reconciler.send(());
    if let Err(err) = reconcile_task.await {
        tracing::error!(error = %err, "reconciler task failed");
    }
    tracing::info!("server shut down gracefully");
}

//! Application configuration loaded from environment variables.

use std::time::Duration;

use ledger::AmqpConfig;
use saga::RetryPolicy;

/// Default port of the order service.
pub const ORDER_SERVICE_PORT: u16 = 3003;

/// Default port of the payment service.
pub const PAYMENT_SERVICE_PORT: u16 = 3004;

/// Default metrics port of the transaction worker.
pub const WORKER_METRICS_PORT: u16 = 9464;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Settings shared by the service and worker binaries.
///
/// Reads from environment variables:
/// - `HOST`, `PORT` (default: `0.0.0.0`, service-specific port)
/// - `DATABASE_URL` (unset: in-memory store)
/// - `CUSTOMER_SERVICE_URL`, `PRODUCT_SERVICE_URL`, `PAYMENT_SERVICE_URL`
/// - `HTTP_TIMEOUT_MS`, `HTTP_MAX_RETRIES`
/// - `PAYMENT_APPROVAL_RATE`
/// - `ORDER_RECONCILE_INTERVAL_SECS`, `ORDER_STALE_AFTER_SECS`
/// - `RUST_LOG`, `LOG_FORMAT`
/// - broker settings, see [`AmqpConfig::from_env`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub customer_service_url: String,
    pub product_service_url: String,
    pub payment_service_url: String,
    pub http_timeout: Duration,
    pub http_max_retries: usize,
    pub approval_rate: f64,
    pub reconcile_interval: Duration,
    pub stale_after: Duration,
    pub amqp: AmqpConfig,
}

impl Config {
    /// Loads the order service configuration.
    pub fn from_env() -> Self {
        Self::load(ORDER_SERVICE_PORT)
    }

    /// Loads the payment service configuration.
    pub fn payment_service_from_env() -> Self {
        Self::load(PAYMENT_SERVICE_PORT)
    }

    /// Loads the transaction worker configuration. `PORT` is the metrics
    /// scrape port.
    pub fn worker_from_env() -> Self {
        Self::load(WORKER_METRICS_PORT)
    }

    fn load(default_port: u16) -> Self {
        let defaults = Self {
            port: default_port,
            ..Self::default()
        };
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: var("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            customer_service_url: var("CUSTOMER_SERVICE_URL")
                .unwrap_or(defaults.customer_service_url),
            product_service_url: var("PRODUCT_SERVICE_URL").unwrap_or(defaults.product_service_url),
            payment_service_url: var("PAYMENT_SERVICE_URL").unwrap_or(defaults.payment_service_url),
            http_timeout: parsed("HTTP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.http_timeout),
            http_max_retries: parsed("HTTP_MAX_RETRIES").unwrap_or(defaults.http_max_retries),
            approval_rate: parsed("PAYMENT_APPROVAL_RATE").unwrap_or(defaults.approval_rate),
            reconcile_interval: parsed("ORDER_RECONCILE_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            stale_after: parsed("ORDER_STALE_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            amqp: AmqpConfig::from_env(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the retry policy for the gateway clients.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.http_timeout, self.http_max_retries)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: ORDER_SERVICE_PORT,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            customer_service_url: "http://localhost:3001".to_string(),
            product_service_url: "http://localhost:3002".to_string(),
            payment_service_url: "http://localhost:3004".to_string(),
            http_timeout: Duration::from_millis(5000),
            http_max_retries: 2,
            approval_rate: 0.9,
            reconcile_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            amqp: AmqpConfig::default(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|v| v.trim().parse().ok())
}

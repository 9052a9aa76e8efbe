//! HTTP implementations of the gateways.
//!
//! Every call carries the client-wide timeout from [`RetryPolicy`]. Lookups
//! are retried with exponential backoff whenever the failure says nothing
//! about the entity itself. Payment submission is retried only when the
//! request never left the client.

use async_trait::async_trait;
use backon::Retryable;
use domain::{CustomerId, OrderId, PaymentRequest, PaymentStatus, ProductId};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::inventory::{Customer, InventoryGateway, ProductAvailability};
use super::payment::{PaymentGateway, PaymentReceipt};
use crate::error::GatewayError;
use crate::retry::{RetryPolicy, is_retryable_lookup, is_retryable_submission};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn build_client(policy: &RetryPolicy) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(policy.timeout).build()
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else if err.is_connect() {
        GatewayError::Unavailable(err.to_string())
    } else {
        GatewayError::Interrupted(err.to_string())
    }
}

/// Extracts `{"error": ...}` from a failed response, falling back to the raw
/// body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.is_empty() => format!("HTTP {status}"),
        Err(_) => body.chars().take(200).collect(),
    }
}

/// Maps a non-success status to a gateway error.
async fn status_error(response: Response, entity: &'static str) -> GatewayError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return GatewayError::NotFound(entity);
    }
    let message = error_message(response).await;
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::ServerError {
            status: status.as_u16(),
            message,
        }
    } else {
        GatewayError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn log_retry(service: &'static str) -> impl Fn(&GatewayError, std::time::Duration) {
    move |err, delay| {
        warn!(
            service,
            error = %err,
            backoff_ms = delay.as_millis() as u64,
            "gateway call failed, retrying"
        );
    }
}

/// Customer and product lookups over HTTP.
///
/// Base URLs are service roots such as `http://localhost:3001`; the client
/// appends `/api/customers/{id}` and `/api/products/{id}/availability`.
#[derive(Debug, Clone)]
pub struct HttpInventoryGateway {
    client: Client,
    customer_base_url: String,
    product_base_url: String,
    policy: RetryPolicy,
}

impl HttpInventoryGateway {
    /// Creates a new client.
    pub fn new(
        customer_base_url: impl Into<String>,
        product_base_url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&policy)?,
            customer_base_url: trim_base(customer_base_url.into()),
            product_base_url: trim_base(product_base_url.into()),
            policy,
        })
    }

    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Customer, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/api/customers/{}",
                self.customer_base_url, customer_id
            ))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, "Customer").await);
        }
        decode(response).await
    }

    async fn fetch_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/api/products/{}/availability",
                self.product_base_url, product_id
            ))
            .query(&[("quantity", quantity)])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, "Product").await);
        }
        decode(response).await
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    #[tracing::instrument(skip_all, fields(customer_id = %customer_id))]
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<Customer, GatewayError> {
        (|| self.fetch_customer(customer_id))
            .retry(self.policy.backoff())
            .when(is_retryable_lookup)
            .notify(log_retry("customer"))
            .await
    }

    #[tracing::instrument(skip_all, fields(product_id = %product_id, quantity))]
    async fn get_product_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability, GatewayError> {
        (|| self.fetch_availability(product_id, quantity))
            .retry(self.policy.backoff())
            .when(is_retryable_lookup)
            .notify(log_retry("product"))
            .await
    }
}

/// Payment submission over HTTP (`POST /api/payments/process`).
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpPaymentGateway {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&policy)?,
            base_url: trim_base(base_url.into()),
            policy,
        })
    }

    async fn post_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError> {
        let response = self
            .client
            .post(format!("{}/api/payments/process", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }
        if !status.is_success() {
            return Err(status_error(response, "Payment").await);
        }

        let receipt: PaymentReceipt = decode(response).await?;
        if !receipt.is_completed() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: format!("Payment {} is {}", receipt.payment_id, receipt.status),
            });
        }
        Ok(receipt)
    }

    async fn query_completed(&self, order_id: &OrderId) -> Result<Vec<PaymentReceipt>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/api/payments", self.base_url))
            .query(&[
                ("orderId", order_id.as_str()),
                ("status", PaymentStatus::Completed.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, "Payment").await);
        }
        decode(response).await
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip_all, fields(order_id = %request.order_id))]
    async fn submit(&self, request: &PaymentRequest) -> Result<PaymentReceipt, GatewayError> {
        (|| self.post_payment(request))
            .retry(self.policy.backoff())
            .when(is_retryable_submission)
            .notify(log_retry("payment"))
            .await
    }

    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    async fn find_payment_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentReceipt>, GatewayError> {
        let receipts = (|| self.query_completed(order_id))
            .retry(self.policy.backoff())
            .when(is_retryable_lookup)
            .notify(log_retry("payment"))
            .await?;
        Ok(receipts.into_iter().find(PaymentReceipt::is_completed))
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_base() {
        assert_eq!(trim_base("http://localhost:3001/".into()), "http://localhost:3001");
        assert_eq!(trim_base("http://localhost:3001".into()), "http://localhost:3001");
    }
}

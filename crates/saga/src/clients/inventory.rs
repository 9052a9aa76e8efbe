//! Customer and product lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{CustomerId, Money, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::GatewayError;

/// A customer record as returned by the customer service.
///
/// Only the fields the saga needs are kept; anything else in the response is
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Stock and price of a product for a requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAvailability {
    pub product_id: ProductId,
    pub available: bool,
    pub requested_quantity: u32,
    pub available_stock: i64,
    #[serde(rename = "price")]
    pub unit_price: Money,
}

impl ProductAvailability {
    /// Builds an availability answer; `available` is true iff stock covers
    /// the requested quantity.
    pub fn new(
        product_id: ProductId,
        requested_quantity: u32,
        available_stock: i64,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            available: available_stock >= i64::from(requested_quantity),
            requested_quantity,
            available_stock,
            unit_price,
        }
    }
}

/// Read-only lookups against the customer and product services.
///
/// Implementations must report a missing entity as
/// [`GatewayError::NotFound`] and keep it distinct from transport failures.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Confirms that a customer exists.
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<Customer, GatewayError>;

    /// Reports stock and unit price of a product for `quantity` units.
    async fn get_product_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability, GatewayError>;
}

#[async_trait]
impl<T: InventoryGateway + ?Sized> InventoryGateway for Arc<T> {
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<Customer, GatewayError> {
        (**self).get_customer(customer_id).await
    }

    async fn get_product_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability, GatewayError> {
        (**self).get_product_availability(product_id, quantity).await
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, (i64, Money)>,
    customer_service_down: bool,
    product_service_down: bool,
    customer_lookups: usize,
    product_lookups: usize,
}

/// In-memory customer and product catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryGateway {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryGateway {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a customer.
    pub async fn add_customer(&self, customer_id: impl Into<CustomerId>) {
        let customer_id = customer_id.into();
        self.state.write().await.customers.insert(
            customer_id.clone(),
            Customer {
                customer_id,
                name: None,
                email: None,
            },
        );
    }

    /// Registers a product with its stock and unit price.
    pub async fn add_product(&self, product_id: impl Into<ProductId>, stock: i64, price: Money) {
        self.state
            .write()
            .await
            .products
            .insert(product_id.into(), (stock, price));
    }

    /// Makes customer lookups fail as if the service were unreachable.
    pub async fn set_customer_service_down(&self, down: bool) {
        self.state.write().await.customer_service_down = down;
    }

    /// Makes product lookups fail as if the service were unreachable.
    pub async fn set_product_service_down(&self, down: bool) {
        self.state.write().await.product_service_down = down;
    }

    /// Returns the number of customer lookups served.
    pub async fn customer_lookups(&self) -> usize {
        self.state.read().await.customer_lookups
    }

    /// Returns the number of product lookups served.
    pub async fn product_lookups(&self) -> usize {
        self.state.read().await.product_lookups
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventoryGateway {
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<Customer, GatewayError> {
        let mut state = self.state.write().await;
        state.customer_lookups += 1;
        if state.customer_service_down {
            return Err(GatewayError::Unavailable("customer service down".into()));
        }
        state
            .customers
            .get(customer_id)
            .cloned()
            .ok_or(GatewayError::NotFound("Customer"))
    }

    async fn get_product_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ProductAvailability, GatewayError> {
        let mut state = self.state.write().await;
        state.product_lookups += 1;
        if state.product_service_down {
            return Err(GatewayError::Unavailable("product service down".into()));
        }
        let (stock, price) = state
            .products
            .get(product_id)
            .copied()
            .ok_or(GatewayError::NotFound("Product"))?;
        Ok(ProductAvailability::new(
            product_id.clone(),
            quantity,
            stock,
            price,
        ))
    }
}

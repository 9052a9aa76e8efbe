//! Order commands.

use common::{CustomerId, OrderId, ProductId};

use super::{OrderError, OrderStatus};

/// Quantity used when a request leaves it out.
pub const DEFAULT_QUANTITY: i64 = 1;

/// Request to place an order for one product.
///
/// The quantity is kept as the caller sent it so that out-of-range values
/// are reported by [`PlaceOrder::validate`] rather than lost in a cast.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// The product being ordered.
    pub product_id: ProductId,

    /// Requested quantity; must be a positive integer.
    pub quantity: i64,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        customer_id: impl Into<CustomerId>,
        product_id: impl Into<ProductId>,
        quantity: i64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Creates a PlaceOrder command for a single unit.
    pub fn single(customer_id: impl Into<CustomerId>, product_id: impl Into<ProductId>) -> Self {
        Self::new(customer_id, product_id, DEFAULT_QUANTITY)
    }

    /// Checks the command shape and returns the validated quantity.
    pub fn validate(&self) -> Result<u32, OrderError> {
        if self.customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired);
        }
        if self.product_id.is_blank() {
            return Err(OrderError::ProductIdRequired);
        }
        match u32::try_from(self.quantity) {
            Ok(quantity) if quantity >= 1 => Ok(quantity),
            _ => Err(OrderError::InvalidQuantity {
                quantity: self.quantity,
            }),
        }
    }
}

/// Operator request to move an order to a new status.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    /// The order to update.
    pub order_id: OrderId,

    /// The requested status.
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: impl Into<OrderId>, status: OrderStatus) -> Self {
        Self {
            order_id: order_id.into(),
            status,
        }
    }

    /// Parses the status from its wire name.
    pub fn parse(order_id: impl Into<OrderId>, status: &str) -> Result<Self, OrderError> {
        Ok(Self::new(order_id, status.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_positive_quantity() {
        assert_eq!(PlaceOrder::new("C1", "P1", 3).validate().unwrap(), 3);
        assert_eq!(PlaceOrder::single("C1", "P1").validate().unwrap(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_quantities() {
        for quantity in [0, -1, i64::from(u32::MAX) + 1] {
            assert!(matches!(
                PlaceOrder::new("C1", "P1", quantity).validate(),
                Err(OrderError::InvalidQuantity { .. })
            ));
        }
    }

    #[test]
    fn test_validate_requires_ids() {
        assert!(matches!(
            PlaceOrder::new("", "P1", 1).validate(),
            Err(OrderError::CustomerIdRequired)
        ));
        assert!(matches!(
            PlaceOrder::new("C1", "", 1).validate(),
            Err(OrderError::ProductIdRequired)
        ));
    }

    #[test]
    fn test_parse_status_update() {
        let cmd = UpdateOrderStatus::parse("ORDER-1", "paid").unwrap();
        assert_eq!(cmd.status, OrderStatus::Paid);
        assert!(UpdateOrderStatus::parse("ORDER-1", "refunded").is_err());
    }
}

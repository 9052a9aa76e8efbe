//! The order record.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, PaymentId, ProductId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};

/// A purchase of a single product by a single customer.
///
/// `amount` is computed once in [`Order::place`] and is never recomputed;
/// repositories persist it on insert only. All later mutation goes through
/// the status transitions below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: Money,
    #[serde(rename = "orderStatus")]
    pub status: OrderStatus,
    pub payment_id: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order, computing `amount = unit_price × quantity`.
    pub fn place(
        order_id: OrderId,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        if customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired);
        }
        if product_id.is_blank() {
            return Err(OrderError::ProductIdRequired);
        }
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: i64::from(quantity),
            });
        }
        if unit_price.is_negative() {
            return Err(OrderError::InvalidPrice { price: unit_price });
        }
        let amount = unit_price
            .checked_multiply(quantity)
            .ok_or(OrderError::AmountOverflow)?;

        let now = Utc::now();
        Ok(Self {
            order_id,
            customer_id,
            product_id,
            quantity,
            amount,
            status: OrderStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Records the payment identifier returned by the gateway while the order
    /// is still pending.
    ///
    /// This is the write-ahead half of confirmation: once persisted, a
    /// recovery pass can finish confirming the order even if the process dies
    /// before [`Order::confirm`] lands.
    pub fn record_payment(&mut self, payment_id: PaymentId) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(self.invalid_transition("record payment"));
        }
        if let Some(existing) = &self.payment_id
            && existing != &payment_id
        {
            return Err(OrderError::PaymentAlreadyRecorded {
                order_id: self.order_id.clone(),
                payment_id: existing.clone(),
            });
        }
        self.payment_id = Some(payment_id);
        self.touch();
        Ok(())
    }

    /// Moves a pending order with a recorded payment to `confirmed`.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(self.invalid_transition("confirm"));
        }
        if self.payment_id.is_none() {
            return Err(OrderError::PaymentRequired {
                order_id: self.order_id.clone(),
            });
        }
        self.status = OrderStatus::Confirmed;
        self.touch();
        Ok(())
    }

    /// Moves a pending order without a payment to `cancelled`.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }
        if let Some(payment_id) = &self.payment_id {
            return Err(OrderError::PaymentAlreadyRecorded {
                order_id: self.order_id.clone(),
                payment_id: payment_id.clone(),
            });
        }
        self.status = OrderStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Moves a confirmed order to `paid`.
    pub fn settle(&mut self) -> Result<(), OrderError> {
        if !self.status.can_settle() {
            return Err(self.invalid_transition("settle"));
        }
        self.status = OrderStatus::Paid;
        self.touch();
        Ok(())
    }

    /// Applies an operator-requested status through the matching transition.
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), OrderError> {
        match target {
            OrderStatus::Confirmed => self.confirm(),
            OrderStatus::Cancelled => self.cancel(),
            OrderStatus::Paid => self.settle(),
            OrderStatus::Pending => Err(self.invalid_transition("reopen")),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }

    fn invalid_transition(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_order() -> Order {
        Order::place(
            OrderId::generate(),
            CustomerId::new("C1"),
            ProductId::new("P1"),
            2,
            Money::from_decimal(99.99).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_place_computes_amount() {
        let order = pending_order();
        assert_eq!(order.amount, Money::from_cents(19998));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment_id.is_none());
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_place_rejects_bad_input() {
        let place = |c: &str, p: &str, q: u32, price: i64| {
            Order::place(
                OrderId::generate(),
                CustomerId::new(c),
                ProductId::new(p),
                q,
                Money::from_cents(price),
            )
        };
        assert!(matches!(
            place("", "P1", 1, 100),
            Err(OrderError::CustomerIdRequired)
        ));
        assert!(matches!(
            place("C1", " ", 1, 100),
            Err(OrderError::ProductIdRequired)
        ));
        assert!(matches!(
            place("C1", "P1", 0, 100),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            place("C1", "P1", 1, -1),
            Err(OrderError::InvalidPrice { .. })
        ));
        assert!(matches!(
            place("C1", "P1", 2, i64::MAX),
            Err(OrderError::AmountOverflow)
        ));
    }

    #[test]
    fn test_confirm_requires_recorded_payment() {
        let mut order = pending_order();
        assert!(matches!(
            order.confirm(),
            Err(OrderError::PaymentRequired { .. })
        ));

        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        order.confirm().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_id, Some(PaymentId::new("PAY-1")));
    }

    #[test]
    fn test_record_payment_is_idempotent_for_same_id() {
        let mut order = pending_order();
        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        assert!(matches!(
            order.record_payment(PaymentId::new("PAY-2")),
            Err(OrderError::PaymentAlreadyRecorded { .. })
        ));
    }

    #[test]
    fn test_cancel_keeps_payment_null() {
        let mut order = pending_order();
        order.cancel().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.payment_id.is_none());
        assert!(matches!(
            order.confirm(),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_cannot_cancel_after_payment_recorded() {
        let mut order = pending_order();
        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        assert!(order.cancel().is_err());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_transition_to_paid_only_from_confirmed() {
        let mut order = pending_order();
        assert!(order.transition_to(OrderStatus::Paid).is_err());

        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        order.transition_to(OrderStatus::Confirmed).unwrap();
        order.transition_to(OrderStatus::Paid).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.transition_to(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_json_shape() {
        let order = pending_order();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderStatus"], "pending");
        assert_eq!(json["amount"], 199.98);
        assert_eq!(json["customerId"], "C1");
        assert!(json["paymentId"].is_null());
        assert!(json["createdAt"].is_string());
    }
}

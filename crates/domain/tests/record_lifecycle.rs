//! Integration tests for the order, payment and transaction records.
//!
//! These tests follow one purchase through its records the way the services
//! hand it along: order placed, payment charged, intent published, ledger
//! entry written.

use domain::{
    CustomerId, DomainError, Money, Order, OrderError, OrderId, OrderStatus, Payment, PaymentId,
    PaymentRequest, PaymentStatus, ProductId, Transaction, TransactionIntent, TransactionStatus,
    UpdateOrderStatus,
};

fn place(quantity: u32) -> Order {
    Order::place(
        OrderId::generate(),
        CustomerId::new("C1"),
        ProductId::new("P1"),
        quantity,
        Money::from_decimal(99.99).unwrap(),
    )
    .unwrap()
}

fn charge(order: &Order) -> PaymentRequest {
    PaymentRequest {
        customer_id: order.customer_id.clone(),
        order_id: order.order_id.clone(),
        product_id: order.product_id.clone(),
        amount: order.amount,
    }
}

mod purchase {
    use super::*;

    #[test]
    fn successful_purchase_links_all_records() {
        let mut order = place(2);
        assert_eq!(order.amount, Money::from_decimal(199.98).unwrap());

        let mut payment = Payment::initiate(PaymentId::generate(), charge(&order));
        payment.complete().unwrap();

        order.record_payment(payment.payment_id.clone()).unwrap();
        order.confirm().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let intent = TransactionIntent::for_payment(&payment).unwrap();
        intent.validate().unwrap();
        let tx = Transaction::completed(intent);

        assert_eq!(tx.payment_id, payment.payment_id);
        assert_eq!(tx.order_id, order.order_id);
        assert_eq!(tx.amount, order.amount);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_ne!(tx.transaction_id.as_str(), payment.payment_id.as_str());
    }

    #[test]
    fn failed_payment_cancels_order_without_ledger_entry() {
        let mut order = place(1);
        let mut payment = Payment::initiate(PaymentId::generate(), charge(&order));
        payment.fail().unwrap();

        order.cancel().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.payment_id.is_none());

        assert!(matches!(
            TransactionIntent::for_payment(&payment),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn amount_is_fixed_at_placement() {
        let mut order = place(3);
        let amount = order.amount;

        order.record_payment(PaymentId::new("PAY-1")).unwrap();
        order.confirm().unwrap();
        order.settle().unwrap();

        assert_eq!(order.amount, amount);
        assert_eq!(order.status, OrderStatus::Paid);
    }
}

mod operator_updates {
    use super::*;

    #[test]
    fn unknown_status_is_rejected_before_loading_anything() {
        let err = UpdateOrderStatus::parse("ORDER-1", "shipped").unwrap_err();
        assert!(matches!(err, OrderError::UnknownStatus(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn cancelled_order_cannot_be_settled() {
        let mut order = place(1);
        order.cancel().unwrap();

        let err = order.transition_to(OrderStatus::Paid).unwrap_err();
        assert!(matches!(err, OrderError::InvalidStateTransition { .. }));
        assert!(!err.is_validation());
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn nothing_moves_back_to_pending() {
        let mut order = place(1);
        assert!(order.transition_to(OrderStatus::Pending).is_err());
    }
}

mod payments {
    use super::*;

    #[test]
    fn terminal_payment_cannot_change() {
        let order = place(1);
        let mut payment = Payment::initiate(PaymentId::generate(), charge(&order));
        payment.fail().unwrap();

        assert!(matches!(
            payment.complete(),
            Err(DomainError::PaymentFinalized { .. })
        ));
        assert_eq!(payment.status, PaymentStatus::Failed);
    }
}

//! Pluggable charge approval.
//!
//! There is no real card processor behind the payment service; the decision
//! is delegated to a strategy so that production runs can simulate declines
//! while tests stay deterministic.

use domain::Payment;
use rand::Rng;

/// Decline reason used by [`RandomApproval`].
pub const SIMULATED_DECLINE: &str = "Payment processing failed - Demo failure simulation";

/// Outcome of an approval decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Approved,
    Declined(String),
}

/// Decides whether a pending payment is charged.
pub trait ApprovalStrategy: Send + Sync {
    fn decide(&self, payment: &Payment) -> Approval;
}

/// Approves every charge.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl ApprovalStrategy for AlwaysApprove {
    fn decide(&self, _payment: &Payment) -> Approval {
        Approval::Approved
    }
}

/// Declines every charge.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDecline;

impl ApprovalStrategy for AlwaysDecline {
    fn decide(&self, _payment: &Payment) -> Approval {
        Approval::Declined("Payment declined".to_string())
    }
}

/// Approves a charge with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomApproval {
    rate: f64,
}

impl RandomApproval {
    /// Creates a strategy approving with probability `rate`, clamped to
    /// `[0, 1]`.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    /// Returns the approval probability.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Default for RandomApproval {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl ApprovalStrategy for RandomApproval {
    fn decide(&self, _payment: &Payment) -> Approval {
        if rand::rng().random_bool(self.rate) {
            Approval::Approved
        } else {
            Approval::Declined(SIMULATED_DECLINE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerId, Money, OrderId, PaymentId, PaymentRequest, ProductId};

    fn payment() -> Payment {
        Payment::initiate(
            PaymentId::generate(),
            PaymentRequest {
                customer_id: CustomerId::new("C1"),
                order_id: OrderId::new("ORDER-1"),
                product_id: ProductId::new("P1"),
                amount: Money::from_cents(100),
            },
        )
    }

    #[test]
    fn test_fixed_strategies() {
        assert_eq!(AlwaysApprove.decide(&payment()), Approval::Approved);
        assert!(matches!(
            AlwaysDecline.decide(&payment()),
            Approval::Declined(_)
        ));
    }

    #[test]
    fn test_random_rate_extremes_are_deterministic() {
        let p = payment();
        assert!((0..50).all(|_| RandomApproval::new(1.0).decide(&p) == Approval::Approved));
        assert!((0..50).all(|_| RandomApproval::new(0.0).decide(&p) != Approval::Approved));
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(RandomApproval::new(1.5).rate(), 1.0);
        assert_eq!(RandomApproval::new(-0.5).rate(), 0.0);
        assert_eq!(RandomApproval::new(f64::NAN).rate(), 0.0);
        assert_eq!(RandomApproval::default().rate(), 0.9);
    }
}

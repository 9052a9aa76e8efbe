//! Money amounts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 2^63, the first cent count past `i64::MAX`.
const CENTS_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A decimal value that cannot be represented as a whole number of cents.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("amount {0} is not a finite value within range")]
pub struct InvalidAmount(pub f64);

/// Money amount represented in cents to avoid floating point drift.
///
/// On the wire amounts travel as decimal numbers (`199.98`), so serde goes
/// through `f64` and rounds to the nearest cent when reading. NaN,
/// infinities and values beyond the cent range are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new amount from a decimal value, rounding to the nearest cent.
    pub fn from_decimal(value: f64) -> Result<Self, InvalidAmount> {
        let cents = (value * 100.0).round();
        if !(-CENTS_LIMIT..CENTS_LIMIT).contains(&cents) {
            return Err(InvalidAmount(value));
        }
        Ok(Self {
            cents: cents as i64,
        })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal value.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_decimal()
    }
}

impl TryFrom<f64> for Money {
    type Error = InvalidAmount;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_conversion_rounds_to_cents() {
        assert_eq!(Money::from_decimal(99.99).unwrap().cents(), 9999);
        assert_eq!(Money::from_decimal(0.1 + 0.2).unwrap().cents(), 30);
        assert_eq!(Money::from_cents(19998).as_decimal(), 199.98);
    }

    #[test]
    fn multiply_price_by_quantity() {
        let price = Money::from_decimal(99.99).unwrap();
        assert_eq!(price.checked_multiply(2), Some(Money::from_cents(19998)));
        assert_eq!(Money::from_cents(i64::MAX).checked_multiply(2), None);
    }

    #[test]
    fn decimal_conversion_rejects_unrepresentable_values() {
        assert_eq!(Money::from_decimal(f64::NAN).map_err(|e| e.0.is_nan()), Err(true));
        assert_eq!(
            Money::from_decimal(f64::INFINITY),
            Err(InvalidAmount(f64::INFINITY))
        );
        assert_eq!(Money::from_decimal(1e17), Err(InvalidAmount(1e17)));
        assert_eq!(Money::from_decimal(-1e17), Err(InvalidAmount(-1e17)));
        assert_eq!(
            Money::from_decimal(9e16).unwrap().cents(),
            9_000_000_000_000_000_000
        );
    }

    #[test]
    fn display_formats_dollars_and_cents() {
        assert_eq!(Money::from_cents(19998).to_string(), "$199.98");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
    }

    #[test]
    fn serializes_as_decimal_number() {
        let json = serde_json::to_value(Money::from_cents(19998)).unwrap();
        assert_eq!(json, serde_json::json!(199.98));
        let back: Money = serde_json::from_str("199.98").unwrap();
        assert_eq!(back.cents(), 19998);
        assert!(serde_json::from_str::<Money>("1e300").is_err());
    }
}

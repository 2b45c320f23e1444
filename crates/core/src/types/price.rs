//! Type-safe price representation using decimal arithmetic.
//!
//! The backend stores prices as floating point numbers and sends them as JSON
//! numbers. `Price` keeps them as a [`Decimal`] on our side and converts at the
//! serde boundary, so arithmetic and display never see binary float noise.

use core::fmt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency symbol used when rendering prices. The shop trades in rubles.
pub const CURRENCY_SYMBOL: &str = "₽";

/// A price in the shop currency.
///
/// Serialized as a JSON number (`350.0`), deserialized from either a number
/// or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from minor units (kopecks).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, 2))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount rounded to two places with trailing zeros removed (`350`, `12.5`).
    #[must_use]
    pub fn display_amount(&self) -> Decimal {
        self.0.round_dp(2).normalize()
    }

    /// Sum of two prices, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Price of `quantity` units, or `None` on overflow.
    #[must_use]
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {CURRENCY_SYMBOL}", self.display_amount())
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_deserializes_from_json_number() {
        let price: Price = serde_json::from_str("350.0").unwrap();
        assert_eq!(price.to_string(), "350 ₽");

        let price: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(price.to_string(), "12.5 ₽");
    }

    #[test]
    fn test_price_deserializes_from_numeric_string() {
        let price: Price = serde_json::from_str("\"199.90\"").unwrap();
        assert_eq!(price, Price::from_minor(19990));
    }

    #[test]
    fn test_price_serializes_as_number() {
        let json = serde_json::to_value(Price::from_minor(25050)).unwrap();
        assert!(json.is_number());
        assert!((json.as_f64().unwrap() - 250.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_price_arithmetic() {
        let line = Price::from_minor(15000).checked_times(3).unwrap();
        assert_eq!(
            line.checked_add(Price::ZERO),
            Some(Price::from_minor(45000))
        );
    }

    #[test]
    fn test_price_arithmetic_overflow_is_none() {
        let huge = Price::new(Decimal::MAX);
        assert_eq!(huge.checked_times(2), None);
        assert_eq!(huge.checked_add(Price::from_minor(100)), None);

        let large: Price = serde_json::from_str("1e20").unwrap();
        assert_eq!(large.checked_times(1_000_000_000), None);
    }

    #[test]
    fn test_from_minor_negative() {
        assert_eq!(Price::from_minor(-150).amount(), Decimal::new(-150, 2));
    }
}

//! Value Objects for E-commerce

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object. Amounts are kept at the precision they were built
/// with; rounding happens only when converting to minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// Subtracts, flooring at zero.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount.max(Decimal::ZERO), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        let amount = self.amount.checked_mul(Decimal::from(qty)).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// `percent` of this amount, rounded to 2dp.
    pub fn percent(&self, percent: u8) -> Result<Money, MoneyError> {
        let raw = self.amount.checked_mul(Decimal::from(percent)).ok_or(MoneyError::Overflow)? / Decimal::ONE_HUNDRED;
        Ok(Money::new(raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), &self.currency))
    }

    /// Amount in the currency's minor unit (paise, cents), saturating at
    /// `i64::MAX`.
    pub fn minor_units(&self) -> i64 {
        self.amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|scaled| i64::try_from(scaled).ok())
            .unwrap_or(i64::MAX)
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("amount out of range")]
    Overflow,
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inr(amount: i64, scale: u32) -> Money { Money::new(Decimal::new(amount, scale), "INR") }

    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }

    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }

    #[test]
    fn test_money_add() {
        let a = inr(100, 0);
        let b = inr(50, 0);
        assert_eq!(a.checked_add(&b).unwrap().amount(), Decimal::new(150, 0));
    }

    #[test]
    fn test_money_currency_mismatch() {
        let a = inr(100, 0);
        let b = Money::new(Decimal::new(1, 0), "USD");
        assert!(a.checked_add(&b).is_err());
    }

    #[test]
    fn test_sub_floors_at_zero() {
        assert!(inr(10, 0).checked_sub(&inr(25, 0)).unwrap().is_zero());
    }

    #[test]
    fn test_percent_and_minor_units() {
        let price = inr(99999, 2);
        assert_eq!(price.percent(15).unwrap().amount(), Decimal::new(15000, 2));
        assert_eq!(price.minor_units(), 99999);
        assert_eq!(inr(1005, 3).minor_units(), 101);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX, "INR");
        assert_eq!(huge.multiply(2), Err(MoneyError::Overflow));
        assert_eq!(huge.checked_add(&inr(1, 0)), Err(MoneyError::Overflow));
        assert_eq!(huge.percent(50), Err(MoneyError::Overflow));
        assert_eq!(huge.minor_units(), i64::MAX);
        assert_eq!(inr(250, 0).multiply(4).unwrap().amount(), Decimal::new(1000, 0));
    }

    #[test]
    fn test_quantity_subtract() {
        assert_eq!(Quantity::new(3).subtract(5), None);
        assert_eq!(Quantity::new(5).subtract(3), Some(Quantity::new(2)));
    }
}

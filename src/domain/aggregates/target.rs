//! Monthly revenue target. One per month/year.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::MoneyError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTarget {
    year: i32,
    month: u32,
    revenue_target: Decimal,
    updated_at: DateTime<Utc>,
}

impl SalesTarget {
    pub fn new(year: i32, month: u32, revenue_target: Decimal) -> Result<Self, TargetError> {
        Self::check_period(year, month)?;
        let mut target = Self { year, month, revenue_target: Decimal::ZERO, updated_at: Utc::now() };
        target.set_revenue_target(revenue_target)?;
        Ok(target)
    }

    /// Storage key, e.g. `2026-03`.
    pub fn period_key(year: i32, month: u32) -> String { format!("{year:04}-{month:02}") }

    pub fn year(&self) -> i32 { self.year }
    pub fn month(&self) -> u32 { self.month }
    pub fn revenue_target(&self) -> Decimal { self.revenue_target }

    pub fn set_revenue_target(&mut self, value: Decimal) -> Result<(), TargetError> {
        if value <= Decimal::ZERO { return Err(TargetError::NonPositive); }
        self.revenue_target = value;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Achieved share of the target in percent, 2dp.
    pub fn progress(&self, achieved: Decimal) -> Result<Decimal, MoneyError> {
        achieved
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(self.revenue_target))
            .map(|p| p.round_dp(2))
            .ok_or(MoneyError::Overflow)
    }

    pub fn check_period(year: i32, month: u32) -> Result<(), TargetError> {
        if !(1..=12).contains(&month) || !(2000..=2100).contains(&year) {
            return Err(TargetError::InvalidPeriod { year, month });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },
    #[error("Revenue target must be positive")]
    NonPositive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let t = SalesTarget::new(2026, 3, Decimal::new(200_000, 0)).unwrap();
        assert_eq!(t.progress(Decimal::new(50_000, 0)), Ok(Decimal::new(25, 0)));
        assert_eq!(SalesTarget::period_key(2026, 3), "2026-03");
    }

    #[test]
    fn test_progress_against_tiny_target() {
        let t = SalesTarget::new(2026, 3, Decimal::new(1, 28)).unwrap();
        assert_eq!(t.progress(Decimal::new(1_000_000, 0)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_validation() {
        assert_eq!(SalesTarget::new(2026, 13, Decimal::ONE).err(), Some(TargetError::InvalidPeriod { year: 2026, month: 13 }));
        assert_eq!(SalesTarget::new(2026, 1, Decimal::ZERO).err(), Some(TargetError::NonPositive));
    }
}

//! Coupon Aggregate
//!
//! A coupon carries its own usage counters, so recording a use and placing
//! the order that consumed it commit together.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    id: Uuid,
    code: String,
    description: String,
    discount: Discount,
    min_order_amount: Decimal,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    usage_limit: Option<u32>,
    per_user_limit: u32,
    applicability: Applicability,
    active: bool,
    used_count: u32,
    usage: BTreeMap<Uuid, u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discount {
    #[serde(rename_all = "camelCase")]
    Percentage { percent: u8, max_discount: Option<Decimal> },
    Fixed { amount: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Applicability {
    All,
    NewUsers,
    #[serde(rename_all = "camelCase")]
    SpecificUsers { user_ids: Vec<Uuid> },
    #[serde(rename_all = "camelCase")]
    SpecificProducts { product_ids: Vec<Uuid> },
    RegisteredAfter { date: DateTime<Utc> },
}

/// Admin-editable coupon terms.
#[derive(Clone, Debug)]
pub struct CouponTerms {
    pub code: String,
    pub description: String,
    pub discount: Discount,
    pub min_order_amount: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: u32,
    pub applicability: Applicability,
    pub active: bool,
}

impl CouponTerms {
    fn validate(&self) -> Result<(), CouponError> {
        let code = self.code.trim();
        if code.len() < 3 || code.len() > 20 || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(CouponError::InvalidCode);
        }
        if self.ends_at <= self.starts_at { return Err(CouponError::InvalidWindow); }
        if self.min_order_amount.is_sign_negative() { return Err(CouponError::InvalidMinimum); }
        if self.per_user_limit == 0 || self.usage_limit == Some(0) { return Err(CouponError::InvalidLimit); }
        match &self.discount {
            Discount::Percentage { percent, max_discount } => {
                if !(1..=99).contains(percent) { return Err(CouponError::InvalidPercentage); }
                if max_discount.is_some_and(|m| m <= Decimal::ZERO) { return Err(CouponError::InvalidCap); }
            }
            Discount::Fixed { amount } => {
                if *amount <= Decimal::ZERO || *amount >= self.min_order_amount { return Err(CouponError::InvalidFixedAmount); }
            }
        }
        Ok(())
    }
}

/// A priced cart line as seen by coupon evaluation.
#[derive(Clone, Debug)]
pub struct EligibleLine { pub product_id: Uuid, pub total: Money }

/// Who is redeeming and what they are buying.
#[derive(Clone, Debug)]
pub struct RedemptionContext<'a> {
    pub user_id: Uuid,
    pub registered_at: DateTime<Utc>,
    pub prior_orders: usize,
    pub lines: &'a [EligibleLine],
    pub subtotal: &'a Money,
    pub now: DateTime<Utc>,
}

impl Coupon {
    pub fn create(terms: CouponTerms) -> Result<Self, CouponError> {
        terms.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), code: terms.code.trim().to_uppercase(), description: terms.description, discount: terms.discount,
            min_order_amount: terms.min_order_amount, starts_at: terms.starts_at, ends_at: terms.ends_at,
            usage_limit: terms.usage_limit, per_user_limit: terms.per_user_limit, applicability: terms.applicability,
            active: terms.active, used_count: 0, usage: BTreeMap::new(), created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn code(&self) -> &str { &self.code }
    pub fn description(&self) -> &str { &self.description }
    pub fn discount(&self) -> &Discount { &self.discount }
    pub fn min_order_amount(&self) -> Decimal { self.min_order_amount }
    pub fn ends_at(&self) -> DateTime<Utc> { self.ends_at }
    pub fn used_count(&self) -> u32 { self.used_count }
    pub fn uses_by(&self, user_id: Uuid) -> u32 { self.usage.get(&user_id).copied().unwrap_or(0) }
    pub fn is_active(&self) -> bool { self.active }

    /// Replaces the terms. Counters are kept.
    pub fn update(&mut self, terms: CouponTerms) -> Result<(), CouponError> {
        terms.validate()?;
        self.code = terms.code.trim().to_uppercase();
        self.description = terms.description;
        self.discount = terms.discount;
        self.min_order_amount = terms.min_order_amount;
        self.starts_at = terms.starts_at;
        self.ends_at = terms.ends_at;
        self.usage_limit = terms.usage_limit;
        self.per_user_limit = terms.per_user_limit;
        self.applicability = terms.applicability;
        self.active = terms.active;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the coupon is live, still has uses left for the user and is
    /// meant for their account. Product rules depend on the basket and
    /// are not checked here.
    pub fn is_offered_to(&self, user_id: Uuid, registered_at: DateTime<Utc>, prior_orders: usize, now: DateTime<Utc>) -> bool {
        self.check_availability(user_id, now).is_ok() && self.check_audience(user_id, registered_at, prior_orders).is_ok()
    }

    /// Discount this coupon grants for the given basket.
    pub fn evaluate(&self, ctx: &RedemptionContext<'_>) -> Result<Money, CouponError> {
        self.check_availability(ctx.user_id, ctx.now)?;
        if ctx.subtotal.amount() < self.min_order_amount {
            return Err(CouponError::MinimumNotMet { minimum: self.min_order_amount });
        }
        self.check_audience(ctx.user_id, ctx.registered_at, ctx.prior_orders)?;
        let currency = ctx.subtotal.currency();
        let eligible = match &self.applicability {
            Applicability::SpecificProducts { product_ids } => {
                let mut total = Money::zero(currency);
                for line in ctx.lines.iter().filter(|l| product_ids.contains(&l.product_id)) {
                    total = total.checked_add(&line.total).map_err(|_| CouponError::NotApplicable)?;
                }
                if total.is_zero() { return Err(CouponError::NoEligibleItems); }
                total
            }
            _ => ctx.subtotal.clone(),
        };
        let discount = match &self.discount {
            Discount::Percentage { percent, max_discount } => {
                let raw = eligible.percent(*percent).map_err(|_| CouponError::NotApplicable)?;
                match max_discount {
                    Some(cap) if raw.amount() > *cap => Money::new(*cap, currency),
                    _ => raw,
                }
            }
            Discount::Fixed { amount } => Money::new((*amount).min(eligible.amount()), currency),
        };
        Ok(discount)
    }

    pub fn record_use(&mut self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), CouponError> {
        self.check_availability(user_id, now)?;
        self.used_count += 1;
        *self.usage.entry(user_id).or_insert(0) += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Gives back a use, e.g. when the order that consumed it is cancelled.
    pub fn release_use(&mut self, user_id: Uuid) {
        let Some(count) = self.usage.get_mut(&user_id) else { return };
        *count = count.saturating_sub(1);
        if *count == 0 { self.usage.remove(&user_id); }
        self.used_count = self.used_count.saturating_sub(1);
        self.updated_at = Utc::now();
    }

    fn check_audience(&self, user_id: Uuid, registered_at: DateTime<Utc>, prior_orders: usize) -> Result<(), CouponError> {
        let allowed = match &self.applicability {
            Applicability::All | Applicability::SpecificProducts { .. } => true,
            Applicability::NewUsers => prior_orders == 0,
            Applicability::SpecificUsers { user_ids } => user_ids.contains(&user_id),
            Applicability::RegisteredAfter { date } => registered_at > *date,
        };
        if allowed { Ok(()) } else { Err(CouponError::NotApplicable) }
    }

    fn check_availability(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.active { return Err(CouponError::Inactive); }
        if now < self.starts_at { return Err(CouponError::NotStarted); }
        if now >= self.ends_at { return Err(CouponError::Expired); }
        if self.usage_limit.is_some_and(|limit| self.used_count >= limit) { return Err(CouponError::UsageLimitReached); }
        if self.uses_by(user_id) >= self.per_user_limit { return Err(CouponError::PerUserLimitReached); }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Coupon code must be 3-20 letters, digits, '-' or '_'")]
    InvalidCode,
    #[error("End date must be after start date")]
    InvalidWindow,
    #[error("Percentage discount must be between 1 and 99")]
    InvalidPercentage,
    #[error("Maximum discount must be positive")]
    InvalidCap,
    #[error("Fixed discount must be positive and less than the minimum order amount")]
    InvalidFixedAmount,
    #[error("Minimum order amount cannot be negative")]
    InvalidMinimum,
    #[error("Usage limits must be at least 1")]
    InvalidLimit,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not valid yet")]
    NotStarted,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("You have already used this coupon")]
    PerUserLimitReached,
    #[error("Minimum order amount of {minimum} not met")]
    MinimumNotMet { minimum: Decimal },
    #[error("Coupon is not applicable to this account")]
    NotApplicable,
    #[error("Coupon does not apply to any item in the cart")]
    NoEligibleItems,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn terms(discount: Discount, min: i64) -> CouponTerms {
        let now = Utc::now();
        CouponTerms {
            code: "save10".into(), description: "Ten off".into(), discount, min_order_amount: Decimal::new(min, 0),
            starts_at: now - Duration::days(1), ends_at: now + Duration::days(1), usage_limit: Some(2), per_user_limit: 1,
            applicability: Applicability::All, active: true,
        }
    }

    fn inr(amount: i64) -> Money { Money::new(Decimal::new(amount, 0), "INR") }

    fn ctx<'a>(user_id: Uuid, lines: &'a [EligibleLine], subtotal: &'a Money) -> RedemptionContext<'a> {
        RedemptionContext { user_id, registered_at: Utc::now() - Duration::days(30), prior_orders: 0, lines, subtotal, now: Utc::now() }
    }

    #[test]
    fn test_percentage_bounds() {
        for percent in [0, 100] {
            assert_eq!(Coupon::create(terms(Discount::Percentage { percent, max_discount: None }, 0)).err(), Some(CouponError::InvalidPercentage));
        }
        assert!(Coupon::create(terms(Discount::Percentage { percent: 99, max_discount: None }, 0)).is_ok());
    }

    #[test]
    fn test_fixed_must_be_below_minimum() {
        assert_eq!(Coupon::create(terms(Discount::Fixed { amount: Decimal::new(500, 0) }, 500)).err(), Some(CouponError::InvalidFixedAmount));
        assert!(Coupon::create(terms(Discount::Fixed { amount: Decimal::new(200, 0) }, 500)).is_ok());
    }

    #[test]
    fn test_window_must_be_ordered() {
        let mut t = terms(Discount::Percentage { percent: 10, max_discount: None }, 0);
        t.ends_at = t.starts_at;
        assert_eq!(Coupon::create(t).err(), Some(CouponError::InvalidWindow));
    }

    #[test]
    fn test_percentage_capped() {
        let c = Coupon::create(terms(Discount::Percentage { percent: 20, max_discount: Some(Decimal::new(100, 0)) }, 0)).unwrap();
        assert_eq!(c.code(), "SAVE10");
        let subtotal = inr(1000);
        let d = c.evaluate(&ctx(Uuid::now_v7(), &[], &subtotal)).unwrap();
        assert_eq!(d.amount(), Decimal::new(100, 0));
    }

    #[test]
    fn test_minimum_not_met() {
        let c = Coupon::create(terms(Discount::Fixed { amount: Decimal::new(100, 0) }, 500)).unwrap();
        let subtotal = inr(499);
        assert!(matches!(c.evaluate(&ctx(Uuid::now_v7(), &[], &subtotal)), Err(CouponError::MinimumNotMet { .. })));
    }

    #[test]
    fn test_specific_products_only_discount_matching_lines() {
        let shirt = Uuid::now_v7();
        let mut t = terms(Discount::Percentage { percent: 50, max_discount: None }, 0);
        t.applicability = Applicability::SpecificProducts { product_ids: vec![shirt] };
        let c = Coupon::create(t).unwrap();
        let lines = vec![EligibleLine { product_id: shirt, total: inr(400) }, EligibleLine { product_id: Uuid::now_v7(), total: inr(600) }];
        let subtotal = inr(1000);
        assert_eq!(c.evaluate(&ctx(Uuid::now_v7(), &lines, &subtotal)).unwrap().amount(), Decimal::new(200, 0));
        let other = vec![EligibleLine { product_id: Uuid::now_v7(), total: inr(1000) }];
        assert_eq!(c.evaluate(&ctx(Uuid::now_v7(), &other, &subtotal)), Err(CouponError::NoEligibleItems));
    }

    #[test]
    fn test_new_users_rule() {
        let mut t = terms(Discount::Percentage { percent: 10, max_discount: None }, 0);
        t.applicability = Applicability::NewUsers;
        let c = Coupon::create(t).unwrap();
        let subtotal = inr(100);
        let mut context = ctx(Uuid::now_v7(), &[], &subtotal);
        assert!(c.evaluate(&context).is_ok());
        context.prior_orders = 1;
        assert_eq!(c.evaluate(&context), Err(CouponError::NotApplicable));
    }

    #[test]
    fn test_usage_limits() {
        let mut c = Coupon::create(terms(Discount::Percentage { percent: 10, max_discount: None }, 0)).unwrap();
        let (a, b, z) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        c.record_use(a, Utc::now()).unwrap();
        assert_eq!(c.record_use(a, Utc::now()), Err(CouponError::PerUserLimitReached));
        c.record_use(b, Utc::now()).unwrap();
        assert_eq!(c.record_use(z, Utc::now()), Err(CouponError::UsageLimitReached));
        c.release_use(b);
        c.release_use(b);
        assert_eq!(c.used_count(), 1);
        assert_eq!(c.uses_by(b), 0);
        assert!(c.record_use(z, Utc::now()).is_ok());
    }

    #[test]
    fn test_expired() {
        let mut t = terms(Discount::Percentage { percent: 10, max_discount: None }, 0);
        t.starts_at = Utc::now() - Duration::days(3);
        t.ends_at = Utc::now() - Duration::days(2);
        let c = Coupon::create(t).unwrap();
        assert!(!c.is_offered_to(Uuid::now_v7(), Utc::now(), 0, Utc::now()));
    }

    #[test]
    fn test_offers_follow_the_audience() {
        let (owner, other) = (Uuid::now_v7(), Uuid::now_v7());
        let joined = Utc::now() - Duration::days(30);
        let mut t = terms(Discount::Percentage { percent: 10, max_discount: None }, 0);
        t.applicability = Applicability::SpecificUsers { user_ids: vec![owner] };
        let private = Coupon::create(t.clone()).unwrap();
        assert!(private.is_offered_to(owner, joined, 3, Utc::now()));
        assert!(!private.is_offered_to(other, joined, 0, Utc::now()));

        t.applicability = Applicability::NewUsers;
        let welcome = Coupon::create(t.clone()).unwrap();
        assert!(welcome.is_offered_to(other, joined, 0, Utc::now()));
        assert!(!welcome.is_offered_to(other, joined, 1, Utc::now()));

        t.applicability = Applicability::RegisteredAfter { date: Utc::now() - Duration::days(7) };
        assert!(!Coupon::create(t.clone()).unwrap().is_offered_to(other, joined, 0, Utc::now()));

        t.applicability = Applicability::SpecificProducts { product_ids: vec![Uuid::now_v7()] };
        assert!(Coupon::create(t).unwrap().is_offered_to(other, joined, 0, Utc::now()));
    }
}

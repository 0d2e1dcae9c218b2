//! Cart pricing against the live catalog.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::cart::CartItem;
use crate::domain::aggregates::coupon::EligibleLine;
use crate::domain::aggregates::order::{AppliedCoupon, LineItem};
use crate::domain::aggregates::product::{Product, ProductError};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingPolicy { pub fee: Decimal, pub free_threshold: Decimal }

impl ShippingPolicy {
    pub fn charge_for(&self, discounted_subtotal: &Money) -> Money {
        if discounted_subtotal.amount() >= self.free_threshold { Money::zero(discounted_subtotal.currency()) }
        else { Money::new(self.fee, discounted_subtotal.currency()) }
    }
}

/// Why a cart line cannot be bought right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LineIssue {
    Removed,
    Unavailable,
    InvalidVariant,
    InsufficientStock { available: u32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub variant_label: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Money>,
    pub total: Option<Money>,
    pub issue: Option<LineIssue>,
}

impl PricedLine {
    pub fn is_purchasable(&self) -> bool { self.issue.is_none() }

    fn into_line_item(self) -> Option<LineItem> {
        Some(LineItem {
            product_id: self.product_id, variant_id: self.variant_id, name: self.name, sku: self.sku,
            variant_label: self.variant_label, image_url: self.image_url, quantity: self.quantity,
            unit_price: self.unit_price?, total: self.total?,
        })
    }
}

/// Prices each cart line. Lines that cannot be bought are kept and flagged.
pub fn price_items(items: &[CartItem], catalog: &HashMap<Uuid, Product>) -> Vec<PricedLine> {
    items.iter().map(|item| price_item(item, catalog.get(&item.product_id))).collect()
}

fn price_item(item: &CartItem, product: Option<&Product>) -> PricedLine {
    let mut line = PricedLine {
        product_id: item.product_id, variant_id: item.variant_id.clone(), name: String::new(), sku: String::new(),
        variant_label: None, image_url: None, quantity: item.quantity, unit_price: None, total: None, issue: None,
    };
    let Some(product) = product else {
        line.issue = Some(LineIssue::Removed);
        return line;
    };
    let variant = item.variant_id.as_deref();
    line.name = product.name().to_string();
    line.sku = product.sku().to_string();
    line.variant_label = product.variant_label(variant);
    line.image_url = product.image_url().map(str::to_string);
    if !product.is_active() {
        line.issue = Some(LineIssue::Unavailable);
        return line;
    }
    match (product.unit_price(variant), product.available(variant)) {
        (Ok(price), Ok(available)) => match price.multiply(item.quantity) {
            Ok(total) => {
                line.total = Some(total);
                line.unit_price = Some(price);
                if available < item.quantity { line.issue = Some(LineIssue::InsufficientStock { available }); }
            }
            Err(_) => line.issue = Some(LineIssue::Unavailable),
        },
        (Err(ProductError::VariantRequired | ProductError::UnknownVariant(_)), _) | (_, Err(_)) => {
            line.issue = Some(LineIssue::InvalidVariant);
        }
        (Err(_), _) => line.issue = Some(LineIssue::Unavailable),
    }
    line
}

/// Sum of the purchasable lines.
pub fn subtotal(lines: &[PricedLine], currency: &str) -> Result<Money, MoneyError> {
    lines.iter()
        .filter(|l| l.is_purchasable())
        .filter_map(|l| l.total.as_ref())
        .try_fold(Money::zero(currency), |acc, total| acc.checked_add(total))
}

pub fn eligible_lines(lines: &[PricedLine]) -> Vec<EligibleLine> {
    lines.iter()
        .filter(|l| l.is_purchasable())
        .filter_map(|l| l.total.clone().map(|total| EligibleLine { product_id: l.product_id, total }))
        .collect()
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
    pub coupon: Option<AppliedCoupon>,
}

impl Quote {
    pub fn build(lines: Vec<PricedLine>, discount: Money, coupon: Option<AppliedCoupon>, policy: &ShippingPolicy, currency: &str) -> Result<Self, MoneyError> {
        let subtotal = subtotal(&lines, currency)?;
        let discounted = subtotal.checked_sub(&discount)?;
        let shipping = if lines.iter().any(PricedLine::is_purchasable) { policy.charge_for(&discounted) } else { Money::zero(currency) };
        let total = discounted.checked_add(&shipping)?;
        Ok(Self { lines, subtotal, discount, shipping, total, coupon })
    }

    pub fn is_purchasable(&self) -> bool { !self.lines.is_empty() && self.lines.iter().all(PricedLine::is_purchasable) }

    /// Line items for an order. `None` if any line is not purchasable.
    pub fn line_items(&self) -> Option<Vec<LineItem>> {
        if !self.is_purchasable() { return None; }
        self.lines.iter().cloned().map(PricedLine::into_line_item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::ProductDetails;
    use crate::domain::value_objects::Sku;

    fn product(price: i64, stock: u32, publish: bool) -> Product {
        let mut p = Product::create(Sku::new("P").unwrap(), ProductDetails {
            name: "Mug".into(), description: String::new(), category: None, price: Money::new(Decimal::new(price, 0), "INR"),
            compare_at_price: None, images: vec![], stock, variants: vec![],
        }).unwrap();
        if publish { p.publish().unwrap(); }
        p
    }

    fn policy() -> ShippingPolicy { ShippingPolicy { fee: Decimal::new(50, 0), free_threshold: Decimal::new(999, 0) } }

    #[test]
    fn test_flags_unavailable_lines() {
        let (a, b, c) = (product(300, 5, true), product(200, 1, true), product(100, 9, false));
        let items = vec![
            CartItem { product_id: a.id(), variant_id: None, quantity: 2 },
            CartItem { product_id: b.id(), variant_id: None, quantity: 3 },
            CartItem { product_id: c.id(), variant_id: None, quantity: 1 },
            CartItem { product_id: Uuid::now_v7(), variant_id: None, quantity: 1 },
        ];
        let catalog: HashMap<_, _> = [a, b, c].into_iter().map(|p| (p.id(), p)).collect();
        let lines = price_items(&items, &catalog);
        assert_eq!(lines[1].issue, Some(LineIssue::InsufficientStock { available: 1 }));
        assert_eq!(lines[2].issue, Some(LineIssue::Unavailable));
        assert_eq!(lines[3].issue, Some(LineIssue::Removed));
        let quote = Quote::build(lines, Money::zero("INR"), None, &policy(), "INR").unwrap();
        assert_eq!(quote.subtotal.amount(), Decimal::new(600, 0));
        assert_eq!(quote.total.amount(), Decimal::new(650, 0));
        assert!(quote.line_items().is_none());
    }

    #[test]
    fn test_free_shipping_after_discount() {
        let a = product(1000, 5, true);
        let items = vec![CartItem { product_id: a.id(), variant_id: None, quantity: 1 }];
        let catalog: HashMap<_, _> = [(a.id(), a)].into_iter().collect();
        let full = Quote::build(price_items(&items, &catalog), Money::zero("INR"), None, &policy(), "INR").unwrap();
        assert!(full.shipping.is_zero());
        let discounted = Quote::build(price_items(&items, &catalog), Money::new(Decimal::new(100, 0), "INR"), None, &policy(), "INR").unwrap();
        assert_eq!(discounted.shipping.amount(), Decimal::new(50, 0));
        assert_eq!(discounted.total.amount(), Decimal::new(950, 0));
        assert_eq!(discounted.line_items().unwrap().len(), 1);
    }
}

//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku};

/// Highest unit price accepted for a product or variant, 10_000_000_000.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    description: String,
    category: Option<String>,
    price: Money,
    compare_at_price: Option<Money>,
    images: Vec<ProductImage>,
    status: ProductStatus,
    stock: Quantity,
    variants: Vec<Variant>,
    units_sold: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant { pub id: String, pub label: String, pub price: Option<Money>, pub stock: Quantity }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage { pub url: String, pub alt: Option<String>, pub position: u32 }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
}

/// Editable catalog fields.
#[derive(Clone, Debug)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub images: Vec<ProductImage>,
    pub stock: u32,
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn create(sku: Sku, details: ProductDetails) -> Result<Self, ProductError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut product = Self {
            id, sku: sku.clone(), name: String::new(), description: String::new(), category: None,
            price: details.price.clone(), compare_at_price: None, images: vec![], status: ProductStatus::Draft,
            stock: Quantity::default(), variants: vec![], units_sold: 0, created_at: now, updated_at: now, events: vec![],
        };
        product.update(details)?;
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku }));
        Ok(product)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn category(&self) -> Option<&str> { self.category.as_deref() }
    pub fn price(&self) -> &Money { &self.price }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn variants(&self) -> &[Variant] { &self.variants }
    pub fn units_sold(&self) -> u32 { self.units_sold }
    pub fn image_url(&self) -> Option<&str> { self.images.iter().min_by_key(|i| i.position).map(|i| i.url.as_str()) }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    /// Total sellable units across the product or all of its variants.
    pub fn total_stock(&self) -> u32 {
        if self.variants.is_empty() { self.stock.value() } else { self.variants.iter().fold(0u32, |n, v| n.saturating_add(v.stock.value())) }
    }

    pub fn matches(&self, search: &str) -> bool {
        let needle = search.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.description.to_lowercase().contains(&needle)
    }

    pub fn update(&mut self, details: ProductDetails) -> Result<(), ProductError> {
        if details.name.trim().is_empty() { return Err(ProductError::MissingName); }
        let prices = std::iter::once(&details.price)
            .chain(details.compare_at_price.as_ref())
            .chain(details.variants.iter().filter_map(|v| v.price.as_ref()));
        for price in prices {
            if price.amount() <= Decimal::ZERO || price.amount() > MAX_PRICE { return Err(ProductError::InvalidPrice); }
        }
        let mut seen = std::collections::HashSet::new();
        if details.variants.iter().any(|v| !seen.insert(v.id.as_str())) { return Err(ProductError::DuplicateVariant); }
        self.name = details.name.trim().to_string();
        self.description = details.description;
        self.category = details.category;
        self.price = details.price;
        self.compare_at_price = details.compare_at_price;
        self.images = details.images;
        self.stock = Quantity::new(details.stock);
        self.variants = details.variants;
        self.touch();
        Ok(())
    }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    /// Price charged for one unit of the given variant.
    pub fn unit_price(&self, variant_id: Option<&str>) -> Result<Money, ProductError> {
        match self.variant(variant_id)? {
            Some(v) => Ok(v.price.clone().unwrap_or_else(|| self.price.clone())),
            None => Ok(self.price.clone()),
        }
    }

    pub fn available(&self, variant_id: Option<&str>) -> Result<u32, ProductError> {
        Ok(match self.variant(variant_id)? { Some(v) => v.stock.value(), None => self.stock.value() })
    }

    pub fn variant_label(&self, variant_id: Option<&str>) -> Option<String> {
        self.variant(variant_id).ok().flatten().map(|v| v.label.clone())
    }

    /// Takes `qty` units out of stock. Leaves the product untouched on failure.
    pub fn reserve(&mut self, variant_id: Option<&str>, qty: u32) -> Result<(), ProductError> {
        if !self.is_active() { return Err(ProductError::NotAvailable); }
        let slot = self.stock_slot(variant_id)?;
        let available = slot.value();
        *slot = slot.subtract(qty).ok_or(ProductError::InsufficientStock { available, requested: qty })?;
        self.units_sold = self.units_sold.saturating_add(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReserved {
            product_id: self.id, variant_id: variant_id.map(str::to_string), quantity: qty,
        }));
        Ok(())
    }

    pub fn release(&mut self, variant_id: Option<&str>, qty: u32) -> Result<(), ProductError> {
        let slot = self.stock_slot(variant_id)?;
        *slot = slot.add(qty);
        self.units_sold = self.units_sold.saturating_sub(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReleased {
            product_id: self.id, variant_id: variant_id.map(str::to_string), quantity: qty,
        }));
        Ok(())
    }

    fn variant(&self, variant_id: Option<&str>) -> Result<Option<&Variant>, ProductError> {
        match (self.variants.is_empty(), variant_id) {
            (true, None) => Ok(None),
            (true, Some(id)) => Err(ProductError::UnknownVariant(id.to_string())),
            (false, None) => Err(ProductError::VariantRequired),
            (false, Some(id)) => self.variants.iter().find(|v| v.id == id).map(Some).ok_or_else(|| ProductError::UnknownVariant(id.to_string())),
        }
    }

    fn stock_slot(&mut self, variant_id: Option<&str>) -> Result<&mut Quantity, ProductError> {
        self.variant(variant_id)?;
        match variant_id {
            Some(id) => self.variants.iter_mut().find(|v| v.id == id).map(|v| &mut v.stock).ok_or_else(|| ProductError::UnknownVariant(id.to_string())),
            None => Ok(&mut self.stock),
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price must be positive and at most 10000000000")]
    InvalidPrice,
    #[error("Variant ids must be unique")]
    DuplicateVariant,
    #[error("A variant must be selected for this product")]
    VariantRequired,
    #[error("Unknown variant {0}")]
    UnknownVariant(String),
    #[error("Product is not available for sale")]
    NotAvailable,
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn details(stock: u32, variants: Vec<Variant>) -> ProductDetails {
        ProductDetails {
            name: "Linen Shirt".into(), description: "Loose fit".into(), category: Some("shirts".into()),
            price: Money::new(Decimal::new(1499, 0), "INR"), compare_at_price: None, images: vec![], stock, variants,
        }
    }

    fn sized() -> Vec<Variant> {
        vec![
            Variant { id: "m".into(), label: "M".into(), price: None, stock: Quantity::new(2) },
            Variant { id: "xl".into(), label: "XL".into(), price: Some(Money::new(Decimal::new(1599, 0), "INR")), stock: Quantity::new(1) },
        ]
    }

    #[test]
    fn test_product_create() {
        let mut p = Product::create(Sku::new("shirt-01").unwrap(), details(3, vec![])).unwrap();
        assert_eq!(p.name(), "Linen Shirt");
        assert_eq!(p.status(), ProductStatus::Draft);
        assert_eq!(p.take_events().len(), 1);
    }

    #[test]
    fn test_reserve_requires_active() {
        let mut p = Product::create(Sku::new("S").unwrap(), details(3, vec![])).unwrap();
        assert_eq!(p.reserve(None, 1), Err(ProductError::NotAvailable));
    }

    #[test]
    fn test_inventory() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), details(10, vec![])).unwrap();
        p.publish().unwrap();
        p.reserve(None, 4).unwrap();
        assert_eq!(p.available(None).unwrap(), 6);
        assert_eq!(p.units_sold(), 4);
        assert_eq!(p.reserve(None, 7), Err(ProductError::InsufficientStock { available: 6, requested: 7 }));
        assert_eq!(p.available(None).unwrap(), 6);
        p.release(None, 4).unwrap();
        assert_eq!(p.available(None).unwrap(), 10);
        assert_eq!(p.units_sold(), 0);
    }

    #[test]
    fn test_variants() {
        let mut p = Product::create(Sku::new("V").unwrap(), details(0, sized())).unwrap();
        p.publish().unwrap();
        assert_eq!(p.reserve(None, 1), Err(ProductError::VariantRequired));
        assert_eq!(p.unit_price(Some("xl")).unwrap().amount(), Decimal::new(1599, 0));
        assert_eq!(p.unit_price(Some("m")).unwrap().amount(), Decimal::new(1499, 0));
        p.reserve(Some("m"), 2).unwrap();
        assert_eq!(p.total_stock(), 1);
        assert!(matches!(p.reserve(Some("s"), 1), Err(ProductError::UnknownVariant(_))));
    }

    #[test]
    fn test_price_bounds() {
        let mut over = details(1, vec![]);
        over.price = Money::new(MAX_PRICE + Decimal::ONE, "INR");
        assert_eq!(Product::create(Sku::new("P").unwrap(), over).err(), Some(ProductError::InvalidPrice));
        let mut variants = sized();
        variants[1].price = Some(Money::new(Decimal::ZERO, "INR"));
        assert_eq!(Product::create(Sku::new("P").unwrap(), details(0, variants)).err(), Some(ProductError::InvalidPrice));
        let mut top = details(1, vec![]);
        top.price = Money::new(MAX_PRICE, "INR");
        assert!(Product::create(Sku::new("P").unwrap(), top).is_ok());
    }

    #[test]
    fn test_duplicate_variants_rejected() {
        let mut variants = sized();
        variants[1].id = "m".into();
        assert_eq!(Product::create(Sku::new("D").unwrap(), details(0, variants)).err(), Some(ProductError::DuplicateVariant));
    }
}

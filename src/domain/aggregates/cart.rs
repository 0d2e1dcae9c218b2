//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// A user's cart. Prices are not stored here: they are read from the
/// catalog whenever the cart is priced.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_id: Uuid,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    fn is(&self, product_id: Uuid, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, items: vec![], updated_at: Utc::now() }
    }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn quantity_of(&self, product_id: Uuid, variant_id: Option<&str>) -> u32 {
        self.items.iter().find(|i| i.is(product_id, variant_id)).map_or(0, |i| i.quantity)
    }

    /// Adds `quantity` units, merging with an existing line. Returns the
    /// line's new quantity.
    pub fn add_item(&mut self, product_id: Uuid, variant_id: Option<String>, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let current = self.quantity_of(product_id, variant_id.as_deref());
        let next = current.saturating_add(quantity);
        if next > MAX_LINE_QUANTITY { return Err(CartError::LineLimit { max: MAX_LINE_QUANTITY }); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.is(product_id, variant_id.as_deref())) {
            existing.quantity = next;
        } else {
            self.items.push(CartItem { product_id, variant_id, quantity });
        }
        self.touch();
        Ok(next)
    }

    /// Sets the quantity of an existing line; zero removes it.
    pub fn update_quantity(&mut self, product_id: Uuid, variant_id: Option<&str>, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::LineLimit { max: MAX_LINE_QUANTITY }); }
        let item = self.items.iter_mut().find(|i| i.is(product_id, variant_id)).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| !i.is(product_id, variant_id)); }
        else { item.quantity = quantity; }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid, variant_id: Option<&str>) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| !i.is(product_id, variant_id));
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("At most {max} units per item")]
    LineLimit { max: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_operations() {
        let p1 = Uuid::now_v7();
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_item(p1, None, 2).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.add_item(p1, None, 1).unwrap(), 3);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        cart.add_item(p1, Some("xl".into()), 1).unwrap();
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_line_limit() {
        let p1 = Uuid::now_v7();
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_item(p1, None, 8).unwrap();
        assert_eq!(cart.add_item(p1, None, 3), Err(CartError::LineLimit { max: MAX_LINE_QUANTITY }));
        assert_eq!(cart.quantity_of(p1, None), 8);
        assert_eq!(cart.add_item(p1, None, 0), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_update_to_zero_removes() {
        let p1 = Uuid::now_v7();
        let mut cart = Cart::new(Uuid::now_v7());
        cart.add_item(p1, Some("m".into()), 2).unwrap();
        assert_eq!(cart.update_quantity(p1, None, 1), Err(CartError::ItemNotFound));
        cart.update_quantity(p1, Some("m"), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.remove_item(p1, Some("m")), Err(CartError::ItemNotFound));
    }
}

//! Wishlist Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    user_id: Uuid,
    product_ids: Vec<Uuid>,
    updated_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn new(user_id: Uuid) -> Self { Self { user_id, product_ids: vec![], updated_at: Utc::now() } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn product_ids(&self) -> &[Uuid] { &self.product_ids }
    pub fn contains(&self, product_id: Uuid) -> bool { self.product_ids.contains(&product_id) }

    /// Returns false when the product was already saved.
    pub fn add(&mut self, product_id: Uuid) -> bool {
        if self.contains(product_id) { return false; }
        self.product_ids.push(product_id);
        self.updated_at = Utc::now();
        true
    }

    /// Returns false when the product was not saved.
    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| *id != product_id);
        let removed = self.product_ids.len() != before;
        if removed { self.updated_at = Utc::now(); }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let p = Uuid::now_v7();
        let mut w = Wishlist::new(Uuid::now_v7());
        assert!(w.add(p));
        assert!(!w.add(p));
        assert_eq!(w.product_ids().len(), 1);
        assert!(w.remove(p));
        assert!(!w.remove(p));
    }
}

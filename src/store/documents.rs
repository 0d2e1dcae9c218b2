//! Storage mapping for each aggregate.

use super::{Collection, Document};
use crate::domain::aggregates::{Cart, Coupon, Order, Product, SalesTarget, User, Wishlist};

pub const EMAIL: &str = "email";
pub const SKU: &str = "sku";
pub const COUPON_CODE: &str = "code";
pub const ORDER_NUMBER: &str = "order_number";
pub const GATEWAY_ORDER: &str = "gateway_order";

impl Document for User {
    const COLLECTION: Collection = Collection::Users;
    fn key(&self) -> String { self.id().to_string() }
    fn tag(&self) -> Option<String> { Some(self.role().as_str().to_string()) }
    fn lookups(&self) -> Vec<(&'static str, String)> { vec![(EMAIL, self.email().to_string())] }
}

impl Document for Product {
    const COLLECTION: Collection = Collection::Products;
    fn key(&self) -> String { self.id().to_string() }
    fn tag(&self) -> Option<String> { Some(self.status().as_str().to_string()) }
    fn lookups(&self) -> Vec<(&'static str, String)> { vec![(SKU, self.sku().to_string())] }
}

impl Document for Cart {
    const COLLECTION: Collection = Collection::Carts;
    fn key(&self) -> String { self.user_id().to_string() }
}

impl Document for Wishlist {
    const COLLECTION: Collection = Collection::Wishlists;
    fn key(&self) -> String { self.user_id().to_string() }
}

impl Document for Coupon {
    const COLLECTION: Collection = Collection::Coupons;
    fn key(&self) -> String { self.id().to_string() }
    fn lookups(&self) -> Vec<(&'static str, String)> { vec![(COUPON_CODE, self.code().to_string())] }
}

impl Document for Order {
    const COLLECTION: Collection = Collection::Orders;
    fn key(&self) -> String { self.id().to_string() }
    fn owner(&self) -> Option<String> { Some(self.user_id().to_string()) }
    fn tag(&self) -> Option<String> { Some(self.status().as_str().to_string()) }
    fn lookups(&self) -> Vec<(&'static str, String)> {
        std::iter::once((ORDER_NUMBER, self.order_number().to_string()))
            .chain(self.payment().gateway_order_ids.iter().map(|id| (GATEWAY_ORDER, id.clone())))
            .collect()
    }
}

impl Document for SalesTarget {
    const COLLECTION: Collection = Collection::Targets;
    fn key(&self) -> String { SalesTarget::period_key(self.year(), self.month()) }
}

//! Aggregates module
pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;
pub mod target;
pub mod user;
pub mod wishlist;

pub use cart::{Cart, CartError, CartItem};
pub use coupon::{Applicability, Coupon, CouponError, CouponTerms, Discount};
pub use order::{Actor, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus};
pub use product::{Product, ProductDetails, ProductError, ProductStatus};
pub use target::{SalesTarget, TargetError};
pub use user::{Address, Role, User, UserError};
pub use wishlist::Wishlist;

//! Storefront - Self-hosted E-commerce Backend
//!
//! Storefront and back-office API for a single shop.
//!
//! ## Features
//! - Product catalog management
//! - Shopping cart, wishlist and checkout
//! - Coupons with usage limits and applicability rules
//! - Order lifecycle with gateway, manual UPI and cash-on-delivery payments
//! - Admin dashboard analytics and monthly revenue targets

pub mod auth;
pub mod config;
pub mod domain;
pub mod events;
pub mod http;
pub mod payments;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::auth::AuthError;
use crate::domain::aggregates::{CartError, CouponError, OrderError, ProductError, TargetError, UserError};
use crate::domain::value_objects::{MoneyError, SkuError};
use crate::payments::PaymentError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Product not found")]
    ProductNotFound,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Coupon not found")]
    CouponNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Some items in the cart can no longer be purchased")]
    CartNotPurchasable,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Sku(#[from] SkuError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs.iter().find_map(|e| e.message.as_ref().map(|m| m.to_string())).unwrap_or_else(|| "is invalid".into());
                format!("{field} {detail}")
            })
            .collect();
        fields.sort();
        Self::Validation(fields.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

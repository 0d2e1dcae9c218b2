//! Customer endpoints under `/api/users`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::order::PaymentOutcome;
use crate::domain::aggregates::{Address, PaymentMethod};
use crate::http::extract::AuthUser;
use crate::http::{ok, ok_with, AppState};
use crate::services::checkout::PlaceOrder;
use crate::services::orders::GatewayConfirmation;
use crate::Result;

pub async fn me(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.profile(user.id).await?))
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 2, max = 100, message = "is required"))]
    pub full_name: String,
    #[validate(length(min = 7, max = 15, message = "must be 7-15 characters"))]
    pub phone: String,
    #[validate(length(min = 3, max = 200, message = "is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 2, max = 100, message = "is required"))]
    pub city: String,
    #[validate(length(min = 2, max = 100, message = "is required"))]
    pub state: String,
    #[validate(length(min = 3, max = 12, message = "must be 3-12 characters"))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String { "India".to_string() }

impl From<AddressRequest> for Address {
    fn from(r: AddressRequest) -> Self {
        Address {
            id: Uuid::nil(), full_name: r.full_name, phone: r.phone, line1: r.line1, line2: r.line2, city: r.city,
            state: r.state, postal_code: r.postal_code, country: r.country, is_default: r.is_default,
        }
    }
}

pub async fn list_addresses(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.addresses(user.id).await?))
}

pub async fn add_address(State(s): State<AppState>, user: AuthUser, Json(r): Json<AddressRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok((StatusCode::CREATED, ok_with("Address added", s.services.add_address(user.id, r.into()).await?)))
}

pub async fn remove_address(State(s): State<AppState>, Path(id): Path<Uuid>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok_with("Address removed", s.services.remove_address(user.id, id).await?))
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    #[validate(range(min = 0, max = 10, message = "must be between 0 and 10"))]
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

pub async fn get_cart(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.cart(user.id).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, user: AuthUser, Json(r): Json<CartLineRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let cart = s.services.add_to_cart(user.id, r.product_id, r.variant_id.as_deref(), r.quantity).await?;
    Ok(ok_with("Item added to cart", cart))
}

pub async fn update_cart_item(State(s): State<AppState>, user: AuthUser, Json(r): Json<CartLineRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let cart = s.services.update_cart_item(user.id, r.product_id, r.variant_id.as_deref(), r.quantity).await?;
    Ok(ok_with("Cart updated", cart))
}

pub async fn remove_from_cart(State(s): State<AppState>, user: AuthUser, Json(r): Json<CartLineRequest>) -> Result<impl IntoResponse> {
    let cart = s.services.remove_from_cart(user.id, r.product_id, r.variant_id.as_deref()).await?;
    Ok(ok_with("Item removed from cart", cart))
}

pub async fn clear_cart(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    s.services.clear_cart(user.id).await?;
    Ok(ok_with("Cart cleared", ()))
}

// ---------------------------------------------------------------------------
// Wishlist
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToCartRequest {
    pub variant_id: Option<String>,
}

pub async fn get_wishlist(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.wishlist(user.id).await?))
}

pub async fn add_to_wishlist(State(s): State<AppState>, user: AuthUser, Json(r): Json<WishlistRequest>) -> Result<impl IntoResponse> {
    Ok(ok_with("Added to wishlist", s.services.add_to_wishlist(user.id, r.product_id).await?))
}

pub async fn remove_from_wishlist(State(s): State<AppState>, Path(product_id): Path<Uuid>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok_with("Removed from wishlist", s.services.remove_from_wishlist(user.id, product_id).await?))
}

pub async fn move_to_cart(
    State(s): State<AppState>,
    Path(product_id): Path<Uuid>,
    user: AuthUser,
    body: Option<Json<MoveToCartRequest>>,
) -> Result<impl IntoResponse> {
    let Json(r) = body.unwrap_or_default();
    let cart = s.services.move_to_cart(user.id, product_id, r.variant_id.as_deref()).await?;
    Ok(ok_with("Moved to cart", cart))
}

// ---------------------------------------------------------------------------
// Coupons and checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 3, max = 20, message = "must be 3-20 characters"))]
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub address_id: Uuid,
    #[serde(default = "online")]
    pub payment_method: PaymentMethod,
    #[validate(length(min = 3, max = 20, message = "must be 3-20 characters"))]
    pub coupon_code: Option<String>,
    #[validate(length(min = 6, max = 64, message = "must be 6-64 characters"))]
    pub upi_transaction_id: Option<String>,
}

fn online() -> PaymentMethod { PaymentMethod::Online }

pub async fn apply_coupon(State(s): State<AppState>, user: AuthUser, Json(r): Json<ApplyCouponRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok(ok_with("Coupon applied", s.services.apply_coupon(user.id, &r.code).await?))
}

pub async fn available_coupons(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.available_coupons(user.id).await?))
}

pub async fn checkout_summary(State(s): State<AppState>, user: AuthUser, body: Option<Json<SummaryRequest>>) -> Result<impl IntoResponse> {
    let Json(r) = body.unwrap_or_default();
    Ok(ok(s.services.checkout_summary(user.id, r.coupon_code.as_deref()).await?))
}

pub async fn place_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<PlaceOrderRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let req = PlaceOrder {
        address_id: r.address_id,
        payment_method: r.payment_method,
        coupon_code: r.coupon_code,
        upi_transaction_id: r.upi_transaction_id,
    };
    let placement = s.services.place_order(user.id, &req).await?;
    Ok((StatusCode::CREATED, ok_with("Order placed", placement)))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Field names are fixed by the gateway checkout widget.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_signature: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn list_orders(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.orders_for(user.id).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.order_for(user.id, id).await?))
}

pub async fn verify_payment(State(s): State<AppState>, user: AuthUser, Json(r): Json<VerifyPaymentRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let confirmation = GatewayConfirmation {
        gateway_order_id: r.razorpay_order_id,
        payment_id: r.razorpay_payment_id,
        signature: r.razorpay_signature,
    };
    let (order, outcome) = s.services.verify_payment(user.id, &confirmation).await?;
    let message = match outcome {
        PaymentOutcome::Confirmed => "Payment verified",
        PaymentOutcome::AlreadyConfirmed => "Payment already verified",
        PaymentOutcome::RefundRequired => "Order was cancelled before payment completed; the payment is being refunded",
    };
    Ok(ok_with(message, order))
}

pub async fn retry_payment(State(s): State<AppState>, Path(order_id): Path<Uuid>, user: AuthUser) -> Result<impl IntoResponse> {
    Ok(ok_with("Payment re-initiated", s.services.retry_payment(user.id, order_id).await?))
}

pub async fn cancel_order(
    State(s): State<AppState>,
    Path(order_id): Path<Uuid>,
    user: AuthUser,
    body: Option<Json<CancelRequest>>,
) -> Result<impl IntoResponse> {
    let Json(r) = body.unwrap_or_default();
    Ok(ok_with("Order cancelled", s.services.cancel_order(user.id, order_id, r.reason.as_deref()).await?))
}

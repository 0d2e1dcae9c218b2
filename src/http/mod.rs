//! HTTP surface: router, envelopes, extractors and middleware.

pub mod error;
pub mod extract;
pub mod rate_limit;
mod routes;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::Services;
use rate_limit::{Policy, RateGuard, RateLimiter};
use routes::{admin, auth, products, users};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services, limiter: Arc::new(RateLimiter::default()) }
    }
}

/// Success envelope: `{success: true, message?, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, message: None, data })
}

pub fn ok_with<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, message: Some(message.into()), data })
}

pub fn router(state: AppState) -> Router {
    let auth_limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout-all", post(auth::logout_all))
        .route_layer(from_fn_with_state(RateGuard::new(state.limiter.clone(), Policy::AUTH), rate_limit::enforce));
    let otp_limited = Router::new()
        .route("/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(RateGuard::new(state.limiter.clone(), Policy::OTP), rate_limit::enforce));

    let users = Router::new()
        .route("/me", get(users::me))
        .route("/addresses", get(users::list_addresses).post(users::add_address))
        .route("/addresses/:id", delete(users::remove_address))
        .route("/cart", get(users::get_cart).delete(users::clear_cart))
        .route("/cart/add", post(users::add_to_cart))
        .route("/cart/remove", delete(users::remove_from_cart))
        .route("/cart/update", put(users::update_cart_item))
        .route("/wishlist", get(users::get_wishlist).post(users::add_to_wishlist))
        .route("/wishlist/:product_id", delete(users::remove_from_wishlist))
        .route("/wishlist/:product_id/move-to-cart", post(users::move_to_cart))
        .route("/coupons/apply", post(users::apply_coupon))
        .route("/coupons/available", get(users::available_coupons))
        .route("/checkout/summary", post(users::checkout_summary))
        .route("/checkout/place-order", post(users::place_order))
        .route("/orders", get(users::list_orders))
        .route("/orders/verify-payment", post(users::verify_payment))
        .route("/orders/retry-payment/:order_id", post(users::retry_payment))
        .route("/orders/cancel-order/:order_id", post(users::cancel_order))
        .route("/orders/:id", get(users::get_order));

    let admin = Router::new()
        .route("/products", get(admin::list_products).post(admin::create_product))
        .route("/products/:id", get(admin::get_product).put(admin::update_product).delete(admin::archive_product))
        .route("/coupons", get(admin::list_coupons).post(admin::create_coupon))
        .route("/coupons/:id", get(admin::get_coupon).put(admin::update_coupon).delete(admin::delete_coupon))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order))
        .route("/orders/:id/status", patch(admin::update_order_status))
        .route("/orders/:id/confirm-payment", post(admin::confirm_payment))
        .route("/orders/:id/refund", post(admin::refund_order))
        .route("/dashboard/stats", get(admin::dashboard_stats))
        .route("/dashboard/target", get(admin::get_target).put(admin::set_target));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/products", get(products::list_products))
        .route("/api/products/:id", get(products::get_product))
        .nest("/api/auth", auth_limited.merge(otp_limited))
        .nest("/api/users", users)
        .nest("/api/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

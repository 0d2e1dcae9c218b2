//! Back-office endpoints under `/api/admin`. Every handler requires the
//! admin role.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::product::{ProductImage, Variant};
use crate::domain::aggregates::{Applicability, CouponTerms, Discount, OrderStatus, ProductDetails, ProductStatus};
use crate::domain::value_objects::{Money, Quantity};
use crate::http::extract::AdminUser;
use crate::http::routes::products::ListParams;
use crate::http::{ok, ok_with, AppState};
use crate::services::orders::OrderQuery;
use crate::Result;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<VariantRequest>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRequest {
    pub id: String,
    pub label: String,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
}

impl ProductRequest {
    fn details(&self, currency: &str) -> ProductDetails {
        ProductDetails {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            price: Money::new(self.price, currency),
            compare_at_price: self.compare_at_price.map(|p| Money::new(p, currency)),
            images: self.images.clone(),
            stock: self.stock,
            variants: self
                .variants
                .iter()
                .map(|v| Variant {
                    id: v.id.clone(),
                    label: v.label.clone(),
                    price: v.price.map(|p| Money::new(p, currency)),
                    stock: Quantity::new(v.stock),
                })
                .collect(),
        }
    }
}

pub async fn list_products(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.list_products(&p.into_query(true)).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>, _: AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.product(id, true).await?))
}

pub async fn create_product(State(s): State<AppState>, _: AdminUser, Json(r): Json<ProductRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let sku = r.sku.clone().unwrap_or_else(|| format!("SKU-{:08}", rand::random::<u32>()));
    let details = r.details(&s.services.settings().currency);
    let publish = r.status == Some(ProductStatus::Active);
    let product = s.services.create_product(&sku, details, publish).await?;
    Ok((StatusCode::CREATED, ok_with("Product created", product)))
}

pub async fn update_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    _: AdminUser,
    Json(r): Json<ProductRequest>,
) -> Result<impl IntoResponse> {
    r.validate()?;
    let details = r.details(&s.services.settings().currency);
    Ok(ok_with("Product updated", s.services.update_product(id, details, r.status).await?))
}

pub async fn archive_product(State(s): State<AppState>, Path(id): Path<Uuid>, _: AdminUser) -> Result<impl IntoResponse> {
    s.services.archive_product(id).await?;
    Ok(ok_with("Product archived", ()))
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    #[validate(length(min = 3, max = 20, message = "must be 3-20 characters"))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount: Discount,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub usage_limit: Option<u32>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    #[serde(default = "one")]
    pub per_user_limit: u32,
    #[serde(default = "everyone")]
    pub applicability: Applicability,
    #[serde(default = "yes")]
    pub active: bool,
}

fn one() -> u32 { 1 }
fn everyone() -> Applicability { Applicability::All }
fn yes() -> bool { true }

impl From<CouponRequest> for CouponTerms {
    fn from(r: CouponRequest) -> Self {
        CouponTerms {
            code: r.code, description: r.description, discount: r.discount, min_order_amount: r.min_order_amount,
            starts_at: r.starts_at, ends_at: r.ends_at, usage_limit: r.usage_limit, per_user_limit: r.per_user_limit,
            applicability: r.applicability, active: r.active,
        }
    }
}

pub async fn list_coupons(State(s): State<AppState>, _: AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.list_coupons().await?))
}

pub async fn get_coupon(State(s): State<AppState>, Path(id): Path<Uuid>, _: AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.coupon(id).await?))
}

pub async fn create_coupon(State(s): State<AppState>, _: AdminUser, Json(r): Json<CouponRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok((StatusCode::CREATED, ok_with("Coupon created", s.services.create_coupon(r.into()).await?)))
}

pub async fn update_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    _: AdminUser,
    Json(r): Json<CouponRequest>,
) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok(ok_with("Coupon updated", s.services.update_coupon(id, r.into()).await?))
}

pub async fn delete_coupon(State(s): State<AppState>, Path(id): Path<Uuid>, _: AdminUser) -> Result<impl IntoResponse> {
    s.services.delete_coupon(id).await?;
    Ok(ok_with("Coupon deleted", ()))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub is_critical: bool,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 6, max = 64, message = "must be 6-64 characters"))]
    pub upi_transaction_id: Option<String>,
    #[validate(url(message = "must be a URL"))]
    pub payment_screenshot: Option<String>,
}

pub async fn list_orders(State(s): State<AppState>, _: AdminUser, Query(p): Query<OrderListParams>) -> Result<impl IntoResponse> {
    let q = OrderQuery { status: p.status, page: p.page, per_page: p.per_page };
    Ok(ok(s.services.list_orders(&q).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>, _: AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin_order(id).await?))
}

pub async fn update_order_status(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    Json(r): Json<StatusRequest>,
) -> Result<impl IntoResponse> {
    r.validate()?;
    let order = s.services.update_order_status(admin.id, id, r.status, r.is_critical, r.message.as_deref()).await?;
    Ok(ok_with(format!("Order status updated to {}", r.status), order))
}

pub async fn confirm_payment(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    body: Option<Json<ConfirmPaymentRequest>>,
) -> Result<impl IntoResponse> {
    let Json(r) = body.unwrap_or_default();
    r.validate()?;
    let order = s.services
        .confirm_manual_payment(admin.id, id, r.upi_transaction_id.as_deref(), r.payment_screenshot.as_deref())
        .await?;
    Ok(ok_with("Payment confirmed", order))
}

pub async fn refund_order(State(s): State<AppState>, Path(id): Path<Uuid>, AdminUser(admin): AdminUser) -> Result<impl IntoResponse> {
    Ok(ok_with("Refund completed", s.services.refund_order(admin.id, id).await?))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TargetParams {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    pub month: u32,
    pub year: i32,
    pub revenue_target: Decimal,
}

pub async fn dashboard_stats(State(s): State<AppState>, _: AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.dashboard_stats(Utc::now()).await?))
}

pub async fn get_target(State(s): State<AppState>, _: AdminUser, Query(p): Query<TargetParams>) -> Result<impl IntoResponse> {
    let now = Utc::now();
    let target = s.services.sales_target(p.year.unwrap_or(now.year()), p.month.unwrap_or(now.month())).await?;
    Ok(ok(target))
}

pub async fn set_target(State(s): State<AppState>, _: AdminUser, Json(r): Json<TargetRequest>) -> Result<impl IntoResponse> {
    Ok(ok_with("Target saved", s.services.set_sales_target(r.year, r.month, r.revenue_target).await?))
}

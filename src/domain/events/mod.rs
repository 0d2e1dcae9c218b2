//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::{OrderStatus, PaymentMethod};
use crate::domain::value_objects::Sku;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Bus subject, e.g. `ecommerce.orders.payment_verified`.
    pub fn subject(&self) -> String {
        match self {
            Self::Product(e) => format!("ecommerce.products.{}", e.name()),
            Self::Order(e) => format!("ecommerce.orders.{}", e.name()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: Sku },
    Published { product_id: Uuid },
    Archived { product_id: Uuid },
    StockReserved { product_id: Uuid, variant_id: Option<String>, quantity: u32 },
    StockReleased { product_id: Uuid, variant_id: Option<String>, quantity: u32 },
}

impl ProductEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Published { .. } => "published",
            Self::Archived { .. } => "archived",
            Self::StockReserved { .. } => "stock_reserved",
            Self::StockReleased { .. } => "stock_released",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: Decimal, payment_method: PaymentMethod },
    PaymentVerified { order_id: Uuid, payment_id: String },
    PaymentFailed { order_id: Uuid, attempt: u32 },
    PaymentRetried { order_id: Uuid, gateway_order_id: String, attempt: u32 },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid, reason: String },
    Refunded { order_id: Uuid, amount: Decimal },
}

impl OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::PaymentVerified { .. } => "payment_verified",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::PaymentRetried { .. } => "payment_retried",
            Self::StatusChanged { .. } => "status_changed",
            Self::Cancelled { .. } => "cancelled",
            Self::Refunded { .. } => "refunded",
        }
    }
}

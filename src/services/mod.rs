//! Application services.
//!
//! Each operation loads the aggregates it needs, lets them decide, and
//! commits every touched aggregate in one unit of work. A concurrent
//! writer makes the commit fail with a conflict; the whole operation is
//! then replayed against fresh state.

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod sweeper;
pub mod wishlist;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::domain::aggregates::Product;
use crate::domain::events::DomainEvent;
use crate::domain::pricing::ShippingPolicy;
use crate::events::EventPublisher;
use crate::payments::{GatewayOrder, PaymentGateway};
use crate::store::{Repository, Store, StoreError, Versioned};
use crate::{EcommerceError, Result};

const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Business settings the services need from [`Config`].
#[derive(Clone, Debug)]
pub struct Settings {
    pub currency: String,
    pub shipping: ShippingPolicy,
    pub payment_window: Duration,
    pub max_payment_attempts: u32,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            currency: cfg.currency.clone(),
            shipping: cfg.shipping.clone(),
            payment_window: cfg.payment_window,
            max_payment_attempts: cfg.max_payment_attempts,
        }
    }
}

pub struct Services {
    repo: Repository,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    tokens: TokenIssuer,
    settings: Settings,
}

/// What the client needs to open the gateway checkout.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
    pub key_id: String,
    pub order_id: Uuid,
    pub gateway_order: GatewayOrder,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn slice(items: Vec<T>, page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(20).clamp(1, 100);
        let total = items.len();
        let offset = (page as usize - 1).saturating_mul(per_page as usize);
        let data = items.into_iter().skip(offset).take(per_page as usize).collect();
        Self { data, total, page, per_page }
    }
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        tokens: TokenIssuer,
        settings: Settings,
    ) -> Self {
        Self { repo: Repository::new(store), gateway, events, tokens, settings }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if !events.is_empty() { self.events.publish(events).await; }
    }

    /// Loads the given products, skipping ids that no longer exist.
    async fn load_products(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Versioned<Product>>> {
        let mut products = HashMap::new();
        for &id in ids {
            if products.contains_key(&id) { continue; }
            if let Some(p) = self.repo.get::<Product>(&id.to_string()).await? {
                products.insert(id, p);
            }
        }
        Ok(products)
    }
}

/// Runs `op` until it commits without a version conflict.
async fn with_retry<T, F, Fut>(operation: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(EcommerceError::Storage(StoreError::Conflict { collection, key })) if attempt < MAX_COMMIT_ATTEMPTS => {
                warn!(operation, ?collection, %key, attempt, "write conflict, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=45).collect::<Vec<u32>>(), Some(3), Some(20));
        assert_eq!(page.data, vec![41, 42, 43, 44, 45]);
        assert_eq!(page.total, 45);
    }

    #[test]
    fn test_page_far_past_the_end_is_empty() {
        let page = Page::slice((1..=5).collect::<Vec<u32>>(), Some(u32::MAX), Some(100));
        assert!(page.data.is_empty());
        assert_eq!(page.page, u32::MAX);
    }
}

//! Pricing a cart and turning it into an order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{with_retry, GatewayCheckout, Services};
use crate::domain::aggregates::coupon::RedemptionContext;
use crate::domain::aggregates::order::{AppliedCoupon, NewOrder};
use crate::domain::aggregates::{Cart, Coupon, Order, OrderStatus, PaymentMethod, Product, User, UserError};
use crate::domain::pricing::{self, Quote};
use crate::domain::value_objects::Money;
use crate::store::{Scope, Versioned};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub upi_transaction_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub order: Order,
    /// Present for online orders once the gateway has issued an order id.
    pub payment: Option<GatewayCheckout>,
}

impl Services {
    /// Prices the cart, optionally with a coupon, without placing anything.
    pub async fn checkout_summary(&self, user_id: Uuid, coupon_code: Option<&str>) -> Result<Quote> {
        let user = self.user(user_id).await?;
        let cart = self.load_cart(user_id).await?;
        if cart.is_empty() { return Err(EcommerceError::EmptyCart); }
        let catalog = self.cart_catalog(&cart).await?;
        let coupon = match coupon_code {
            Some(code) => Some(self.coupon_by_code(code).await?),
            None => None,
        };
        self.build_quote(&user, &cart, &catalog, coupon.as_deref(), Utc::now()).await
    }

    /// Reserves stock, records the coupon use, opens the order and clears
    /// the cart in one commit. Online orders then get a gateway order; if
    /// the gateway is unreachable the order stays payable via retry.
    pub async fn place_order(&self, user_id: Uuid, req: &PlaceOrder) -> Result<Placement> {
        let order = with_retry("place_order", move || async move {
            let user = self.user(user_id).await?;
            let address = user.address(req.address_id).cloned().ok_or(UserError::AddressNotFound)?;
            let mut cart = self.load_cart(user_id).await?;
            if cart.is_empty() { return Err(EcommerceError::EmptyCart); }
            let mut catalog = self.cart_catalog(&cart).await?;
            let mut coupon = match req.coupon_code.as_deref() {
                Some(code) => Some(self.coupon_by_code(code).await?),
                None => None,
            };

            let now = Utc::now();
            let quote = self.build_quote(&user, &cart, &catalog, coupon.as_deref(), now).await?;
            let items = quote.line_items().ok_or(EcommerceError::CartNotPurchasable)?;
            for item in &items {
                let product = catalog.get_mut(&item.product_id).ok_or(EcommerceError::ProductNotFound)?;
                product.reserve(item.variant_id.as_deref(), item.quantity)?;
            }
            if let Some(coupon) = coupon.as_mut() {
                coupon.record_use(user_id, now)?;
            }
            let mut order = Versioned::new(Order::place(NewOrder {
                order_number: new_order_number(),
                user_id,
                email: user.email().to_string(),
                items,
                subtotal: quote.subtotal,
                discount: quote.discount,
                shipping: quote.shipping,
                coupon: quote.coupon,
                shipping_address: address,
                method: req.payment_method,
                upi_transaction_id: req.upi_transaction_id.clone(),
            }, now)?);
            cart.clear();

            let mut uow = self.repo.unit_of_work();
            for product in catalog.values() { uow.put(product)?; }
            if let Some(coupon) = &coupon { uow.put(coupon)?; }
            uow.put(&order)?.put(&cart)?;
            uow.commit().await?;

            info!(order_id = %order.id(), order_number = order.order_number(), status = %order.status(), total = %order.total(), "order placed");
            let mut events = order.take_events();
            for product in catalog.values_mut() { events.extend(product.take_events()); }
            self.publish(events).await;
            Ok(order.into_inner())
        })
        .await?;

        if order.payment().method != PaymentMethod::Online {
            return Ok(Placement { order, payment: None });
        }
        match self.open_gateway_order(order.id()).await {
            Ok((order, checkout)) => Ok(Placement { order, payment: Some(checkout) }),
            Err(e) => {
                warn!(order_id = %order.id(), error = %e, "gateway order not created, awaiting payment retry");
                Ok(Placement { order, payment: None })
            }
        }
    }

    pub(crate) async fn build_quote(
        &self,
        user: &User,
        cart: &Cart,
        catalog: &HashMap<Uuid, Versioned<Product>>,
        coupon: Option<&Coupon>,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let currency = self.settings.currency.as_str();
        let products: HashMap<Uuid, Product> = catalog.iter().map(|(id, p)| (*id, Product::clone(p))).collect();
        let lines = pricing::price_items(cart.items(), &products);
        let (discount, applied) = match coupon {
            None => (Money::zero(currency), None),
            Some(coupon) => {
                let subtotal = pricing::subtotal(&lines, currency)?;
                let eligible = pricing::eligible_lines(&lines);
                let discount = coupon.evaluate(&RedemptionContext {
                    user_id: user.id(),
                    registered_at: user.created_at(),
                    prior_orders: self.prior_orders(user.id()).await?,
                    lines: &eligible,
                    subtotal: &subtotal,
                    now,
                })?;
                (discount, Some(AppliedCoupon { coupon_id: coupon.id(), code: coupon.code().to_string() }))
            }
        };
        Ok(Quote::build(lines, discount, applied, &self.settings.shipping, currency)?)
    }

    /// Orders the user has placed that were not cancelled.
    pub(crate) async fn prior_orders(&self, user_id: Uuid) -> Result<usize> {
        Ok(self.repo.scan::<Order>(&Scope::owner(user_id)).await?
            .iter()
            .filter(|o| o.status() != OrderStatus::Cancelled)
            .count())
    }
}

fn new_order_number() -> String {
    format!("ORD-{:08}", rand::random::<u32>())
}

//! Payment reconciliation and order lifecycle operations.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{with_retry, GatewayCheckout, Page, Services};
use crate::domain::aggregates::order::{Cancellation, PaymentOutcome};
use crate::domain::aggregates::{Coupon, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus};
use crate::payments::PaymentError;
use crate::store::documents::GATEWAY_ORDER;
use crate::store::{Scope, Versioned};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct GatewayConfirmation {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Clone, Debug, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Services {
    pub async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.repo.scan::<Order>(&Scope::owner(user_id)).await?.into_iter().map(Versioned::into_inner).collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    pub async fn order_for(&self, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        Ok(self.owned_order(user_id, order_id).await?.into_inner())
    }

    /// Applies a gateway callback. Replaying the same payment is harmless;
    /// a bad signature marks the attempt failed and leaves the order payable.
    pub async fn verify_payment(&self, user_id: Uuid, confirmation: &GatewayConfirmation) -> Result<(Order, PaymentOutcome)> {
        let order = self.repo.find::<Order>(GATEWAY_ORDER, &confirmation.gateway_order_id).await?.ok_or(EcommerceError::OrderNotFound)?;
        if order.user_id() != user_id { return Err(EcommerceError::OrderNotFound); }
        let order_id = order.id();

        if !self.gateway.verify_signature(&confirmation.gateway_order_id, &confirmation.payment_id, &confirmation.signature) {
            warn!(%order_id, gateway_order_id = %confirmation.gateway_order_id, "payment signature mismatch");
            with_retry("fail_payment", move || async move {
                let mut order = self.order(order_id).await?;
                if order.fail_payment("signature verification failed", Utc::now()).is_err() { return Ok(()); }
                let mut uow = self.repo.unit_of_work();
                uow.put(&order)?;
                uow.commit().await?;
                self.publish(order.take_events()).await;
                Ok(())
            })
            .await?;
            return Err(PaymentError::InvalidSignature.into());
        }

        let (order, outcome) = with_retry("verify_payment", move || async move {
            let mut order = self.order(order_id).await?;
            let outcome = order.confirm_gateway_payment(&confirmation.gateway_order_id, &confirmation.payment_id, Utc::now())?;
            if outcome != PaymentOutcome::AlreadyConfirmed {
                let mut uow = self.repo.unit_of_work();
                uow.put(&order)?;
                uow.commit().await?;
                self.publish(order.take_events()).await;
            }
            Ok((order.into_inner(), outcome))
        })
        .await?;

        match outcome {
            PaymentOutcome::Confirmed => info!(%order_id, payment_id = %confirmation.payment_id, "payment verified"),
            PaymentOutcome::AlreadyConfirmed => info!(%order_id, "payment already applied"),
            PaymentOutcome::RefundRequired => {
                warn!(%order_id, "payment arrived for a cancelled order, refunding");
                return Ok((self.settle_refund(order_id, None).await?, outcome));
            }
        }
        Ok((order, outcome))
    }

    /// Issues a fresh gateway order for an unpaid online order.
    pub async fn retry_payment(&self, user_id: Uuid, order_id: Uuid) -> Result<GatewayCheckout> {
        self.owned_order(user_id, order_id).await?;
        let (_, checkout) = self.open_gateway_order(order_id).await?;
        Ok(checkout)
    }

    pub async fn cancel_order(&self, user_id: Uuid, order_id: Uuid, reason: Option<&str>) -> Result<Order> {
        self.owned_order(user_id, order_id).await?;
        let (order, cancellation) = with_retry("cancel_order", move || async move {
            let mut order = self.order(order_id).await?;
            let cancellation = order.cancel_by_customer(reason.map(str::to_string), Utc::now())?;
            let order = self.commit_cancellation(order, &cancellation).await?;
            Ok((order, cancellation))
        })
        .await?;
        info!(%order_id, "order cancelled by customer");
        if cancellation.refund_due { return self.settle_refund(order_id, None).await; }
        Ok(order)
    }

    pub async fn list_orders(&self, q: &OrderQuery) -> Result<Page<Order>> {
        let scope = q.status.map_or_else(Scope::all, |s| Scope::tag(s.as_str()));
        let mut orders: Vec<Order> = self.repo.scan::<Order>(&scope).await?.into_iter().map(Versioned::into_inner).collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(Page::slice(orders, q.page, q.per_page))
    }

    pub async fn admin_order(&self, order_id: Uuid) -> Result<Order> {
        Ok(self.order(order_id).await?.into_inner())
    }

    pub async fn update_order_status(
        &self,
        admin_id: Uuid,
        order_id: Uuid,
        to: OrderStatus,
        is_critical: bool,
        note: Option<&str>,
    ) -> Result<Order> {
        let (order, cancellation) = with_retry("update_order_status", move || async move {
            let mut order = self.order(order_id).await?;
            let from = order.status();
            let cancellation = order.update_status(to, admin_id, is_critical, note.map(str::to_string), Utc::now())?;
            let order = match &cancellation {
                Some(c) => self.commit_cancellation(order, c).await?,
                None => {
                    let mut uow = self.repo.unit_of_work();
                    uow.put(&order)?;
                    uow.commit().await?;
                    self.publish(order.take_events()).await;
                    order.into_inner()
                }
            };
            info!(%order_id, %from, %to, %admin_id, is_critical, "order status updated");
            Ok((order, cancellation))
        })
        .await?;
        match cancellation {
            Some(c) if c.refund_due => self.settle_refund(order_id, None).await,
            _ => Ok(order),
        }
    }

    /// Admin confirmation of a UPI transfer, or of a gateway payment the
    /// callback never reported.
    pub async fn confirm_manual_payment(
        &self,
        admin_id: Uuid,
        order_id: Uuid,
        upi_transaction_id: Option<&str>,
        screenshot: Option<&str>,
    ) -> Result<Order> {
        with_retry("confirm_manual_payment", move || async move {
            let mut order = self.order(order_id).await?;
            order.confirm_manual_payment(admin_id, upi_transaction_id.map(str::to_string), screenshot.map(str::to_string), Utc::now())?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&order)?;
            uow.commit().await?;
            info!(%order_id, %admin_id, "payment confirmed manually");
            self.publish(order.take_events()).await;
            Ok(order.into_inner())
        })
        .await
    }

    /// Completes a pending refund. Gateway payments are refunded through the
    /// gateway; anything else is recorded as refunded by hand.
    pub async fn refund_order(&self, admin_id: Uuid, order_id: Uuid) -> Result<Order> {
        let order = self.order(order_id).await?;
        if order.payment().status != PaymentStatus::RefundPending {
            return Err(OrderError::NotRefundable.into());
        }
        info!(%order_id, %admin_id, "refund requested by admin");
        let order = self.settle_refund(order_id, Some(admin_id)).await?;
        if order.payment().status != PaymentStatus::Refunded {
            return Err(PaymentError::Gateway("refund could not be completed".into()).into());
        }
        Ok(order)
    }

    /// Cancels every online order whose payment window has passed. Returns
    /// how many were cancelled.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<usize> {
        let window = self.settings.payment_window;
        let pending = self.repo.scan::<Order>(&Scope::tag(OrderStatus::PaymentPending.as_str())).await?;
        let overdue: Vec<Uuid> = pending.iter().filter(|o| o.is_payment_expired(now, window)).map(|o| o.id()).collect();
        let mut expired = 0;
        for order_id in overdue {
            let done = with_retry("expire_order", move || async move {
                let mut order = self.order(order_id).await?;
                if !order.is_payment_expired(now, window) { return Ok(false); }
                let cancellation = order.expire(now, window)?;
                self.commit_cancellation(order, &cancellation).await?;
                Ok(true)
            })
            .await;
            match done {
                Ok(true) => { expired += 1; info!(%order_id, "unpaid order expired"); }
                Ok(false) => {}
                Err(e) => error!(%order_id, error = %e, "failed to expire order"),
            }
        }
        Ok(expired)
    }

    /// Checks the order may take a new payment attempt, asks the gateway for
    /// an order id and records it.
    pub(crate) async fn open_gateway_order(&self, order_id: Uuid) -> Result<(Order, GatewayCheckout)> {
        let (window, max_attempts) = (self.settings.payment_window, self.settings.max_payment_attempts);
        let order = self.order(order_id).await?;
        order.ensure_payment_retryable(Utc::now(), window, max_attempts)?;
        let gateway_order = self.gateway.create_order(order.total(), order.order_number()).await?;

        let order = with_retry("attach_gateway_order", || {
            let gateway_order_id = gateway_order.id.clone();
            async move {
                let mut order = self.order(order_id).await?;
                let now = Utc::now();
                order.ensure_payment_retryable(now, window, max_attempts)?;
                order.attach_gateway_order(gateway_order_id, now)?;
                let mut uow = self.repo.unit_of_work();
                uow.put(&order)?;
                uow.commit().await?;
                self.publish(order.take_events()).await;
                Ok(order.into_inner())
            }
        })
        .await?;
        info!(%order_id, gateway_order_id = %gateway_order.id, attempt = order.payment().attempts, "gateway order opened");
        Ok((order, GatewayCheckout { key_id: self.gateway.key_id().to_string(), order_id, gateway_order }))
    }

    /// Refunds a `refund_pending` order. Gateway payments are refunded
    /// straight away; a UPI or cash payment stays pending until an admin
    /// records the refund. A gateway failure is logged and leaves the order
    /// pending so an admin can retry.
    async fn settle_refund(&self, order_id: Uuid, admin_id: Option<Uuid>) -> Result<Order> {
        let order = self.order(order_id).await?;
        if order.payment().status != PaymentStatus::RefundPending { return Ok(order.into_inner()); }
        if order.payment().method != PaymentMethod::Online && admin_id.is_none() {
            info!(%order_id, method = ?order.payment().method, "refund awaits manual settlement");
            return Ok(order.into_inner());
        }
        if order.payment().method == PaymentMethod::Online {
            let Some(payment_id) = order.payment().gateway_payment_id.clone() else {
                warn!(%order_id, "refund pending without a gateway payment id");
                return Ok(order.into_inner());
            };
            match self.gateway.refund(&payment_id, order.total()).await {
                Ok(refund_id) => info!(%order_id, %refund_id, "gateway refund issued"),
                Err(e) => {
                    error!(%order_id, error = %e, "gateway refund failed");
                    return Ok(order.into_inner());
                }
            }
        }
        with_retry("mark_refunded", move || async move {
            let mut order = self.order(order_id).await?;
            if order.payment().status != PaymentStatus::RefundPending { return Ok(order.into_inner()); }
            order.mark_refunded(Utc::now())?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&order)?;
            uow.commit().await?;
            self.publish(order.take_events()).await;
            Ok(order.into_inner())
        })
        .await
    }

    /// Commits a cancelled order together with its restock and coupon release.
    async fn commit_cancellation(&self, mut order: Versioned<Order>, cancellation: &Cancellation) -> Result<Order> {
        let ids: Vec<Uuid> = cancellation.restock.iter().map(|(id, _, _)| *id).collect();
        let mut products = self.load_products(&ids).await?;
        for (product_id, variant_id, quantity) in &cancellation.restock {
            match products.get_mut(product_id) {
                Some(product) => {
                    if let Err(e) = product.release(variant_id.as_deref(), *quantity) {
                        warn!(order_id = %order.id(), %product_id, error = %e, "stock not returned");
                    }
                }
                None => warn!(order_id = %order.id(), %product_id, "product gone, stock not returned"),
            }
        }
        let mut coupon = match cancellation.coupon_id {
            Some(id) => self.repo.get::<Coupon>(&id.to_string()).await?,
            None => None,
        };
        if let Some(coupon) = coupon.as_mut() { coupon.release_use(order.user_id()); }

        let mut uow = self.repo.unit_of_work();
        for product in products.values() { uow.put(product)?; }
        if let Some(coupon) = &coupon { uow.put(coupon)?; }
        uow.put(&order)?;
        uow.commit().await?;

        let mut events = order.take_events();
        for product in products.values_mut() { events.extend(product.take_events()); }
        self.publish(events).await;
        Ok(order.into_inner())
    }

    async fn owned_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Versioned<Order>> {
        let order = self.order(order_id).await?;
        if order.user_id() != user_id { return Err(EcommerceError::OrderNotFound); }
        Ok(order)
    }

    async fn order(&self, order_id: Uuid) -> Result<Versioned<Order>> {
        self.repo.get::<Order>(&order_id.to_string()).await?.ok_or(EcommerceError::OrderNotFound)
    }
}

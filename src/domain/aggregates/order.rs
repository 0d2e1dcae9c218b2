//! Order Aggregate
//!
//! The order owns its lifecycle. Online orders start in `PaymentPending`
//! and move to `Confirmed` once the gateway signature checks out; manual
//! UPI transfers wait in `PaymentVerification` for an admin; cash on
//! delivery is confirmed immediately. Fulfillment then runs
//! `Confirmed -> Processing -> Shipped -> Delivered`. `Delivered` and
//! `Cancelled` are terminal.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::user::Address;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    email: String,
    status: OrderStatus,
    payment: Payment,
    items: Vec<LineItem>,
    subtotal: Money,
    discount: Money,
    shipping: Money,
    total: Money,
    coupon: Option<AppliedCoupon>,
    shipping_address: Address,
    history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub variant_label: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon { pub coupon_id: Uuid, pub code: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Every gateway order issued for this order, oldest first.
    pub gateway_order_ids: Vec<String>,
    pub gateway_payment_id: Option<String>,
    pub attempts: u32,
    pub upi_transaction_id: Option<String>,
    pub payment_screenshot: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn current_gateway_order(&self) -> Option<&str> { self.gateway_order_ids.last().map(String::as_str) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { PaymentPending, PaymentVerification, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::PaymentPending, Self::PaymentVerification, Self::Confirmed, Self::Processing,
        Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentPending => "payment_pending",
            Self::PaymentVerification => "payment_verification",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Position along the fulfillment track, if the status is on it.
    fn fulfillment_step(&self) -> Option<u8> {
        match self {
            Self::Confirmed => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Online, Upi, Cod }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { Pending, Paid, Failed, RefundPending, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor { Customer, Admin(Uuid), System }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    pub note: Option<String>,
}

/// Everything needed to open a new order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Uuid,
    pub email: String,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub coupon: Option<AppliedCoupon>,
    pub shipping_address: Address,
    pub method: PaymentMethod,
    pub upi_transaction_id: Option<String>,
}

/// Result of feeding a verified gateway payment into the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Confirmed,
    /// The same payment was already applied.
    AlreadyConfirmed,
    /// The order was cancelled before the money arrived; it must go back.
    RefundRequired,
}

/// Side effects a cancellation leaves for the caller to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cancellation {
    pub restock: Vec<(Uuid, Option<String>, u32)>,
    pub coupon_id: Option<Uuid>,
    pub refund_due: bool,
}

impl Order {
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if new.items.is_empty() { return Err(OrderError::NoItems); }
        let total = new.subtotal.checked_sub(&new.discount)?.checked_add(&new.shipping)?;
        let status = match new.method {
            PaymentMethod::Online => OrderStatus::PaymentPending,
            PaymentMethod::Upi => OrderStatus::PaymentVerification,
            PaymentMethod::Cod => OrderStatus::Confirmed,
        };
        let id = Uuid::now_v7();
        let mut order = Self {
            id, order_number: new.order_number, user_id: new.user_id, email: new.email, status,
            payment: Payment {
                method: new.method, status: PaymentStatus::Pending, gateway_order_ids: vec![], gateway_payment_id: None,
                attempts: 0, upi_transaction_id: new.upi_transaction_id, payment_screenshot: None, failure_reason: None,
                paid_at: None, refunded_at: None,
            },
            items: new.items, subtotal: new.subtotal, discount: new.discount, shipping: new.shipping, total,
            coupon: new.coupon, shipping_address: new.shipping_address,
            history: vec![StatusChange { from: None, to: status, at: now, actor: Actor::Customer, note: None }],
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id, user_id: order.user_id, total: order.total.amount(), payment_method: new.method,
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment(&self) -> &Payment { &self.payment }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total(&self) -> &Money { &self.total }
    pub fn coupon(&self) -> Option<&AppliedCoupon> { self.coupon.as_ref() }
    pub fn history(&self) -> &[StatusChange] { &self.history }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Paid money the shop keeps: paid and not cancelled.
    pub fn is_revenue(&self) -> bool { self.payment.status == PaymentStatus::Paid && self.status != OrderStatus::Cancelled }

    /// Checks that a new gateway order may be issued for this order.
    pub fn ensure_payment_retryable(&self, now: DateTime<Utc>, window: Duration, max_attempts: u32) -> Result<(), OrderError> {
        if self.payment.method != PaymentMethod::Online { return Err(OrderError::WrongPaymentMethod); }
        if self.status != OrderStatus::PaymentPending
            || !matches!(self.payment.status, PaymentStatus::Pending | PaymentStatus::Failed)
        {
            return Err(OrderError::PaymentNotRetryable { status: self.status });
        }
        if now - self.created_at > window { return Err(OrderError::PaymentWindowElapsed); }
        if self.payment.attempts >= max_attempts { return Err(OrderError::TooManyAttempts { max: max_attempts }); }
        Ok(())
    }

    /// Records a freshly issued gateway order as the current payment attempt.
    pub fn attach_gateway_order(&mut self, gateway_order_id: String, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.payment.method != PaymentMethod::Online { return Err(OrderError::WrongPaymentMethod); }
        if self.status != OrderStatus::PaymentPending { return Err(OrderError::PaymentNotRetryable { status: self.status }); }
        self.payment.attempts += 1;
        self.payment.status = PaymentStatus::Pending;
        self.payment.failure_reason = None;
        self.payment.gateway_order_ids.push(gateway_order_id.clone());
        self.updated_at = now;
        if self.payment.attempts > 1 {
            self.raise_event(DomainEvent::Order(OrderEvent::PaymentRetried {
                order_id: self.id, gateway_order_id, attempt: self.payment.attempts,
            }));
        }
        Ok(())
    }

    /// Applies a gateway payment whose signature has already been verified.
    pub fn confirm_gateway_payment(&mut self, gateway_order_id: &str, payment_id: &str, now: DateTime<Utc>) -> Result<PaymentOutcome, OrderError> {
        if !self.payment.gateway_order_ids.iter().any(|id| id == gateway_order_id) {
            return Err(OrderError::UnknownGatewayOrder);
        }
        match self.payment.status {
            PaymentStatus::Paid | PaymentStatus::RefundPending | PaymentStatus::Refunded => {
                return if self.payment.gateway_payment_id.as_deref() == Some(payment_id) {
                    Ok(PaymentOutcome::AlreadyConfirmed)
                } else {
                    Err(OrderError::AlreadyPaid)
                };
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }
        let cancelled = match self.status {
            OrderStatus::Cancelled => true,
            OrderStatus::PaymentPending => false,
            from => return Err(OrderError::InvalidTransition { from, to: OrderStatus::Confirmed }),
        };
        self.payment.gateway_payment_id = Some(payment_id.to_string());
        self.payment.paid_at = Some(now);
        self.payment.failure_reason = None;
        if cancelled {
            self.payment.status = PaymentStatus::RefundPending;
            self.updated_at = now;
            return Ok(PaymentOutcome::RefundRequired);
        }
        self.payment.status = PaymentStatus::Paid;
        self.transition(OrderStatus::Confirmed, Actor::Customer, Some("payment verified".into()), now);
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentVerified { order_id: self.id, payment_id: payment_id.to_string() }));
        Ok(PaymentOutcome::Confirmed)
    }

    /// Records a failed verification attempt. The order stays retryable.
    pub fn fail_payment(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::PaymentPending || self.payment.status == PaymentStatus::Paid {
            return Err(OrderError::PaymentNotRetryable { status: self.status });
        }
        self.payment.status = PaymentStatus::Failed;
        self.payment.failure_reason = Some(reason.into());
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, attempt: self.payment.attempts }));
        Ok(())
    }

    /// Admin confirmation of a payment made outside the gateway.
    pub fn confirm_manual_payment(&mut self, admin_id: Uuid, upi_transaction_id: Option<String>, screenshot: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.payment.method == PaymentMethod::Cod { return Err(OrderError::WrongPaymentMethod); }
        if self.payment.status == PaymentStatus::Paid { return Err(OrderError::AlreadyPaid); }
        if !matches!(self.status, OrderStatus::PaymentVerification | OrderStatus::PaymentPending) {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Confirmed });
        }
        if upi_transaction_id.is_some() { self.payment.upi_transaction_id = upi_transaction_id; }
        if screenshot.is_some() { self.payment.payment_screenshot = screenshot; }
        self.payment.status = PaymentStatus::Paid;
        self.payment.paid_at = Some(now);
        self.payment.failure_reason = None;
        self.transition(OrderStatus::Confirmed, Actor::Admin(admin_id), Some("payment confirmed manually".into()), now);
        Ok(())
    }

    /// Admin-driven status change. Returns the cancellation effects when
    /// the target is `Cancelled`.
    pub fn update_status(&mut self, to: OrderStatus, admin_id: Uuid, is_critical: bool, note: Option<String>, now: DateTime<Utc>) -> Result<Option<Cancellation>, OrderError> {
        let from = self.status;
        if from.is_terminal() || from == to { return Err(OrderError::InvalidTransition { from, to }); }
        if to == OrderStatus::Cancelled {
            if from == OrderStatus::Shipped && !is_critical { return Err(OrderError::CriticalConfirmationRequired { from, to }); }
            return Ok(Some(self.cancel(Actor::Admin(admin_id), note, now)));
        }
        let (Some(current), Some(target)) = (from.fulfillment_step(), to.fulfillment_step()) else {
            return Err(OrderError::InvalidTransition { from, to });
        };
        if target <= current { return Err(OrderError::InvalidTransition { from, to }); }
        if target > current + 1 && !is_critical { return Err(OrderError::CriticalConfirmationRequired { from, to }); }
        if to == OrderStatus::Delivered && self.payment.method == PaymentMethod::Cod {
            self.payment.status = PaymentStatus::Paid;
            self.payment.paid_at = Some(now);
        }
        self.transition(to, Actor::Admin(admin_id), note, now);
        Ok(None)
    }

    /// Customer cancellation, allowed until the parcel ships.
    pub fn cancel_by_customer(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<Cancellation, OrderError> {
        if matches!(self.status, OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled) {
            return Err(OrderError::CannotCancel { status: self.status });
        }
        Ok(self.cancel(Actor::Customer, reason, now))
    }

    pub fn is_payment_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == OrderStatus::PaymentPending && self.payment.status != PaymentStatus::Paid && now - self.created_at > window
    }

    /// Cancels an online order whose payment window has passed.
    pub fn expire(&mut self, now: DateTime<Utc>, window: Duration) -> Result<Cancellation, OrderError> {
        if !self.is_payment_expired(now, window) { return Err(OrderError::CannotCancel { status: self.status }); }
        Ok(self.cancel(Actor::System, Some("payment window elapsed".into()), now))
    }

    pub fn mark_refunded(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.payment.status != PaymentStatus::RefundPending { return Err(OrderError::NotRefundable); }
        self.payment.status = PaymentStatus::Refunded;
        self.payment.refunded_at = Some(now);
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::Refunded { order_id: self.id, amount: self.total.amount() }));
        Ok(())
    }

    fn cancel(&mut self, actor: Actor, note: Option<String>, now: DateTime<Utc>) -> Cancellation {
        let refund_due = self.payment.status == PaymentStatus::Paid;
        if refund_due { self.payment.status = PaymentStatus::RefundPending; }
        let reason = note.clone().unwrap_or_else(|| "cancelled".into());
        self.transition(OrderStatus::Cancelled, actor, note, now);
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, reason }));
        Cancellation {
            restock: self.items.iter().map(|i| (i.product_id, i.variant_id.clone(), i.quantity)).collect(),
            coupon_id: self.coupon.as_ref().map(|c| c.coupon_id),
            refund_due,
        }
    }

    fn transition(&mut self, to: OrderStatus, actor: Actor, note: Option<String>, now: DateTime<Utc>) {
        let from = self.status;
        self.status = to;
        self.history.push(StatusChange { from: Some(from), to, at: now, actor, note });
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Moving order from {from} to {to} must be flagged as critical")]
    CriticalConfirmationRequired { from: OrderStatus, to: OrderStatus },
    #[error("Order cannot be cancelled once {status}")]
    CannotCancel { status: OrderStatus },
    #[error("Order is already paid")]
    AlreadyPaid,
    #[error("Payment cannot be retried while order is {status}")]
    PaymentNotRetryable { status: OrderStatus },
    #[error("Payment window has elapsed")]
    PaymentWindowElapsed,
    #[error("Payment may be attempted at most {max} times")]
    TooManyAttempts { max: u32 },
    #[error("Operation not supported for this payment method")]
    WrongPaymentMethod,
    #[error("Gateway order does not belong to this order")]
    UnknownGatewayOrder,
    #[error("Order has no pending refund")]
    NotRefundable,
    #[error("Unknown order status {0}")]
    UnknownStatus(String),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn inr(amount: i64) -> Money { Money::new(Decimal::new(amount, 0), "INR") }

    fn order(method: PaymentMethod) -> Order {
        let product_id = Uuid::now_v7();
        let new = NewOrder {
            order_number: "ORD-00000001".into(), user_id: Uuid::now_v7(), email: "test@example.com".into(),
            items: vec![LineItem {
                product_id, variant_id: None, name: "Widget".into(), sku: "W001".into(), variant_label: None, image_url: None,
                quantity: 2, unit_price: inr(10), total: inr(20),
            }],
            subtotal: inr(20), discount: inr(5), shipping: inr(50),
            coupon: Some(AppliedCoupon { coupon_id: Uuid::now_v7(), code: "SAVE5".into() }),
            shipping_address: Address::default(), method, upi_transaction_id: None,
        };
        Order::place(new, Utc::now()).unwrap()
    }

    fn paid_online() -> Order {
        let mut o = order(PaymentMethod::Online);
        o.attach_gateway_order("order_A".into(), Utc::now()).unwrap();
        assert_eq!(o.confirm_gateway_payment("order_A", "pay_1", Utc::now()).unwrap(), PaymentOutcome::Confirmed);
        o
    }

    #[test]
    fn test_initial_status_by_method() {
        assert_eq!(order(PaymentMethod::Online).status(), OrderStatus::PaymentPending);
        assert_eq!(order(PaymentMethod::Upi).status(), OrderStatus::PaymentVerification);
        assert_eq!(order(PaymentMethod::Cod).status(), OrderStatus::Confirmed);
        assert_eq!(order(PaymentMethod::Cod).total().amount(), Decimal::new(65, 0));
    }

    #[test]
    fn test_order_workflow() {
        let mut o = paid_online();
        let admin = Uuid::now_v7();
        assert_eq!(o.status(), OrderStatus::Confirmed);
        o.update_status(OrderStatus::Processing, admin, false, None, Utc::now()).unwrap();
        o.update_status(OrderStatus::Shipped, admin, false, Some("AWB 123".into()), Utc::now()).unwrap();
        o.update_status(OrderStatus::Delivered, admin, false, None, Utc::now()).unwrap();
        assert_eq!(o.status(), OrderStatus::Delivered);
        assert_eq!(o.history().len(), 5);
        assert!(o.update_status(OrderStatus::Cancelled, admin, true, None, Utc::now()).is_err());
    }

    #[test]
    fn test_payment_verification_is_idempotent() {
        let mut o = paid_online();
        assert_eq!(o.confirm_gateway_payment("order_A", "pay_1", Utc::now()).unwrap(), PaymentOutcome::AlreadyConfirmed);
        assert_eq!(o.confirm_gateway_payment("order_A", "pay_2", Utc::now()), Err(OrderError::AlreadyPaid));
        assert_eq!(o.history().len(), 2);
    }

    #[test]
    fn test_unknown_gateway_order_rejected() {
        let mut o = order(PaymentMethod::Online);
        o.attach_gateway_order("order_A".into(), Utc::now()).unwrap();
        assert_eq!(o.confirm_gateway_payment("order_B", "pay_1", Utc::now()), Err(OrderError::UnknownGatewayOrder));
    }

    #[test]
    fn test_rejected_gateway_payment_leaves_order_untouched() {
        let mut o = order(PaymentMethod::Online);
        o.attach_gateway_order("order_A".into(), Utc::now()).unwrap();
        o.status = OrderStatus::Processing;
        let before = o.payment().clone();
        assert!(matches!(
            o.confirm_gateway_payment("order_A", "pay_1", Utc::now()),
            Err(OrderError::InvalidTransition { from: OrderStatus::Processing, .. })
        ));
        assert_eq!(o.payment(), &before);
    }

    #[test]
    fn test_retry_rules() {
        let mut o = order(PaymentMethod::Online);
        let window = Duration::minutes(30);
        o.attach_gateway_order("order_A".into(), Utc::now()).unwrap();
        o.fail_payment("signature mismatch", Utc::now()).unwrap();
        assert_eq!(o.payment().status, PaymentStatus::Failed);
        assert!(o.ensure_payment_retryable(Utc::now(), window, 3).is_ok());
        o.attach_gateway_order("order_B".into(), Utc::now()).unwrap();
        assert_eq!(o.payment().current_gateway_order(), Some("order_B"));
        assert_eq!(o.ensure_payment_retryable(Utc::now(), window, 2), Err(OrderError::TooManyAttempts { max: 2 }));
        assert_eq!(o.ensure_payment_retryable(Utc::now() + Duration::hours(1), window, 3), Err(OrderError::PaymentWindowElapsed));
        // An earlier attempt can still settle the order.
        assert_eq!(o.confirm_gateway_payment("order_A", "pay_9", Utc::now()).unwrap(), PaymentOutcome::Confirmed);
        assert!(matches!(o.ensure_payment_retryable(Utc::now(), window, 3), Err(OrderError::PaymentNotRetryable { .. })));
    }

    #[test]
    fn test_skipping_steps_is_critical() {
        let mut o = order(PaymentMethod::Cod);
        let admin = Uuid::now_v7();
        assert_eq!(
            o.update_status(OrderStatus::Shipped, admin, false, None, Utc::now()),
            Err(OrderError::CriticalConfirmationRequired { from: OrderStatus::Confirmed, to: OrderStatus::Shipped })
        );
        o.update_status(OrderStatus::Shipped, admin, true, None, Utc::now()).unwrap();
        assert!(matches!(o.update_status(OrderStatus::Processing, admin, true, None, Utc::now()), Err(OrderError::InvalidTransition { .. })));
        assert_eq!(
            o.update_status(OrderStatus::Cancelled, admin, false, None, Utc::now()),
            Err(OrderError::CriticalConfirmationRequired { from: OrderStatus::Shipped, to: OrderStatus::Cancelled })
        );
        o.update_status(OrderStatus::Delivered, admin, false, None, Utc::now()).unwrap();
        assert_eq!(o.payment().status, PaymentStatus::Paid);
    }

    #[test]
    fn test_admin_cannot_ship_unpaid_order() {
        let mut o = order(PaymentMethod::Online);
        assert!(matches!(o.update_status(OrderStatus::Processing, Uuid::now_v7(), true, None, Utc::now()), Err(OrderError::InvalidTransition { .. })));
    }

    #[test]
    fn test_customer_cancel_effects() {
        let mut o = paid_online();
        let c = o.cancel_by_customer(Some("changed my mind".into()), Utc::now()).unwrap();
        assert!(c.refund_due);
        assert_eq!(c.restock.len(), 1);
        assert!(c.coupon_id.is_some());
        assert_eq!(o.payment().status, PaymentStatus::RefundPending);
        o.mark_refunded(Utc::now()).unwrap();
        assert_eq!(o.mark_refunded(Utc::now()), Err(OrderError::NotRefundable));
        assert_eq!(o.cancel_by_customer(None, Utc::now()), Err(OrderError::CannotCancel { status: OrderStatus::Cancelled }));
    }

    #[test]
    fn test_expiry_and_late_payment() {
        let mut o = order(PaymentMethod::Online);
        let window = Duration::minutes(30);
        o.attach_gateway_order("order_A".into(), Utc::now()).unwrap();
        assert!(o.expire(Utc::now(), window).is_err());
        let later = Utc::now() + Duration::minutes(31);
        let c = o.expire(later, window).unwrap();
        assert!(!c.refund_due);
        assert_eq!(o.status(), OrderStatus::Cancelled);
        assert_eq!(o.confirm_gateway_payment("order_A", "pay_1", later).unwrap(), PaymentOutcome::RefundRequired);
        assert_eq!(o.payment().status, PaymentStatus::RefundPending);
    }

    #[test]
    fn test_manual_confirmation() {
        let mut o = order(PaymentMethod::Upi);
        o.confirm_manual_payment(Uuid::now_v7(), Some("UPI-77".into()), None, Utc::now()).unwrap();
        assert_eq!(o.status(), OrderStatus::Confirmed);
        assert_eq!(o.payment().upi_transaction_id.as_deref(), Some("UPI-77"));
        assert_eq!(o.confirm_manual_payment(Uuid::now_v7(), None, None, Utc::now()), Err(OrderError::AlreadyPaid));
        let mut cod = order(PaymentMethod::Cod);
        assert_eq!(cod.confirm_manual_payment(Uuid::now_v7(), None, None, Utc::now()), Err(OrderError::WrongPaymentMethod));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("out_for_delivery".parse::<OrderStatus>(), Err(OrderError::UnknownStatus("out_for_delivery".into())));
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    }
}

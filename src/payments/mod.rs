//! Payment gateway boundary.
//!
//! The gateway issues an order id for every payment attempt. After checkout
//! the client posts back `(order_id, payment_id, signature)` where the
//! signature is `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`.

pub mod offline;
pub mod razorpay;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::domain::value_objects::Money;

pub use offline::OfflineGateway;
pub use razorpay::RazorpayGateway;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment signature verification failed")]
    InvalidSignature,
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;
    async fn create_order(&self, amount: &Money, receipt: &str) -> Result<GatewayOrder, PaymentError>;
    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool;
    /// Refunds `amount` of a captured payment. Returns the refund id.
    async fn refund(&self, payment_id: &str, amount: &Money) -> Result<String, PaymentError>;
}

pub fn sign(secret: &str, gateway_order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
    let mac = mac(secret, gateway_order_id, payment_id).ok_or_else(|| PaymentError::Gateway("unusable signing key".into()))?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify(secret: &str, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else { return false };
    mac(secret, gateway_order_id, payment_id).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

fn mac(secret: &str, gateway_order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let sig = sign("secret", "order_1", "pay_1").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify("secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let sig = sign("secret", "order_1", "pay_1").unwrap();
        assert!(!verify("secret", "order_1", "pay_2", &sig));
        assert!(!verify("other", "order_1", "pay_1", &sig));
        assert!(!verify("secret", "order_1", "pay_1", "zz-not-hex"));
        assert!(!verify("secret", "order_1", "pay_1", ""));
    }
}

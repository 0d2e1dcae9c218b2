//! Local gateway for development and tests. Orders and refunds are
//! acknowledged immediately; signatures use the same HMAC scheme as the
//! real gateway with a locally held secret.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{GatewayOrder, PaymentError, PaymentGateway};
use crate::domain::value_objects::Money;

pub struct OfflineGateway { secret: String }

impl OfflineGateway {
    pub fn new(secret: impl Into<String>) -> Self { Self { secret: secret.into() } }
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn key_id(&self) -> &str { "offline" }

    async fn create_order(&self, amount: &Money, receipt: &str) -> Result<GatewayOrder, PaymentError> {
        let order = GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: amount.minor_units(),
            currency: amount.currency().to_string(),
        };
        info!(gateway_order_id = %order.id, receipt, "offline gateway order created");
        Ok(order)
    }

    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        super::verify(&self.secret, gateway_order_id, payment_id, signature)
    }

    async fn refund(&self, payment_id: &str, amount: &Money) -> Result<String, PaymentError> {
        info!(payment_id, %amount, "offline gateway refund");
        Ok(format!("rfnd_{}", Uuid::new_v4().simple()))
    }
}

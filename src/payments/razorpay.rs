//! Razorpay REST client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::{GatewayOrder, PaymentError, PaymentGateway};
use crate::config::RazorpayConfig;
use crate::domain::value_objects::Money;

const API_BASE: &str = "https://api.razorpay.com/v1";

pub struct RazorpayGateway {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse { id: String, amount: i64, currency: String }

#[derive(Debug, Deserialize)]
struct RefundResponse { id: String }

impl RazorpayGateway {
    pub fn new(cfg: &RazorpayConfig) -> Self {
        Self { http: reqwest::Client::new(), key_id: cfg.key_id.clone(), key_secret: cfg.key_secret.clone() }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: serde_json::Value) -> Result<T, PaymentError> {
        let res = self.http
            .post(format!("{API_BASE}{path}"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            error!(%status, path, "razorpay request failed: {}", detail);
            return Err(PaymentError::Gateway(format!("{status}: {detail}")));
        }
        Ok(res.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str { &self.key_id }

    async fn create_order(&self, amount: &Money, receipt: &str) -> Result<GatewayOrder, PaymentError> {
        let body = json!({ "amount": amount.minor_units(), "currency": amount.currency(), "receipt": receipt });
        let order: OrderResponse = self.post("/orders", body).await?;
        info!(gateway_order_id = %order.id, receipt, "razorpay order created");
        Ok(GatewayOrder { id: order.id, amount: order.amount, currency: order.currency })
    }

    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        super::verify(&self.key_secret, gateway_order_id, payment_id, signature)
    }

    async fn refund(&self, payment_id: &str, amount: &Money) -> Result<String, PaymentError> {
        let refund: RefundResponse = self.post(&format!("/payments/{payment_id}/refund"), json!({ "amount": amount.minor_units() })).await?;
        info!(payment_id, refund_id = %refund.id, "razorpay refund issued");
        Ok(refund.id)
    }
}

//! Background expiry of unpaid online orders.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::Services;

pub fn spawn_payment_sweeper(services: Arc<Services>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "payment expiry sweeper started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match services.expire_overdue(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => info!(expired = n, "expired unpaid orders"),
                Err(e) => error!(error = %e, "payment expiry sweep failed"),
            }
        }
    })
}

//! Domain event delivery.
//!
//! Services drain aggregate events after a successful commit and hand them
//! here. Delivery is best effort: a failed publish is logged, never surfaced
//! to the request that caused it.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>);
}

/// Publishes each event as JSON on its subject.
pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { warn!(%subject, error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}

/// Used when no bus is configured.
#[derive(Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            debug!(subject = %event.subject(), payload = ?event, "domain event");
        }
    }
}

//! Per-offer outbound delivery.
//!
//! Each accepted offer is sent once, as soon as it is accepted. Failures are
//! reported to the caller as a [`DeliveryOutcome`] and never retried here.

pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::model::Offer;

pub use webhook::WebhookTransport;

pub const OFFER_PAYLOAD_TYPE: &str = "offer";

/// Wire body of one delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEnvelope<'a> {
    pub job_id: &'a str,
    pub payload_type: &'static str,
    pub data: &'a Offer,
    pub delivery_id: &'a str,
}

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, envelope: &DeliveryEnvelope<'_>) -> Result<(), DeliveryError>;

    fn name(&self) -> &'static str;
}

/// Transport used when no webhook is configured: the offer is only logged.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl DeliveryTransport for LogTransport {
    async fn send(&self, envelope: &DeliveryEnvelope<'_>) -> Result<(), DeliveryError> {
        info!(
            job_id = envelope.job_id,
            delivery_id = envelope.delivery_id,
            product_key = envelope.data.product_key.as_deref().unwrap_or(""),
            "Offer ready (no webhook configured)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// `{job_id}_{sequence}`, sequence being the 1-based accepted-offer index.
pub fn delivery_id(job_id: &str, sequence: usize) -> String {
    format!("{}_{}", job_id, sequence)
}

#[derive(Clone)]
pub struct DeliveryDispatcher {
    transport: Arc<dyn DeliveryTransport>,
    timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(transport: Arc<dyn DeliveryTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub async fn deliver(&self, job_id: &str, offer: &Offer, delivery_id: &str) -> DeliveryOutcome {
        let envelope = DeliveryEnvelope {
            job_id,
            payload_type: OFFER_PAYLOAD_TYPE,
            data: offer,
            delivery_id,
        };

        match tokio::time::timeout(self.timeout, self.transport.send(&envelope)).await {
            Ok(Ok(())) => {
                debug!(delivery_id, transport = self.transport.name(), "Offer delivered");
                DeliveryOutcome::Delivered
            }
            Ok(Err(e)) => {
                warn!(delivery_id, transport = self.transport.name(), error = %e, "Offer delivery failed");
                DeliveryOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    delivery_id,
                    transport = self.transport.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Offer delivery timed out"
                );
                DeliveryOutcome::Failed(format!("timed out after {}s", self.timeout.as_secs()))
            }
        }
    }
}

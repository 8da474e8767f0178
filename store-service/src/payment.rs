use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Opaque reference handed out by a payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReference {
    pub id: String,
    /// Payment method tag stored on the order, e.g. `stripe`.
    pub method: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_reference(&self, order_id: Uuid, amount_minor: i64) -> Result<PaymentReference>;
}

/// Stand-in for a card processor: derives a deterministic intent id and
/// performs no network calls. Refuses to run without an API key.
pub struct MockGateway {
    api_key: Option<String>,
    provider: String,
}

impl MockGateway {
    pub fn new(api_key: Option<String>, provider: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_reference(&self, order_id: Uuid, amount_minor: i64) -> Result<PaymentReference> {
        if self.api_key.is_none() {
            bail!("payment provider API key is not configured");
        }
        if amount_minor <= 0 {
            bail!("payment amount must be positive");
        }
        Ok(PaymentReference {
            id: format!("pi_{}_{}", order_id.simple(), amount_minor),
            method: self.provider.clone(),
        })
    }
}

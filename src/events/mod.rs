mod http;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::OutboundEvent;

pub use http::HttpEventPublisher;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event bus request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("event bus returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to serialize event detail: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("event addressed to unknown bus {0:?}")]
    UnknownBus(String),
}

/// Bulk publish to the routing bus. One call per batch, no retries.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: &[OutboundEvent]) -> Result<(), PublishError>;
}

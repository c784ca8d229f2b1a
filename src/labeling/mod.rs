mod client;
pub mod inference;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::ObjectReference;

pub use client::LabelingClient;

#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("labeling request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("labeling service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("labeling response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Vision labeling service. Zero labels is a valid answer, not an error.
#[async_trait]
pub trait LabelDetector: Send + Sync {
    async fn detect(
        &self,
        reference: &ObjectReference,
        min_confidence: f32,
        max_labels: u32,
    ) -> Result<Vec<String>, LabelingError>;
}

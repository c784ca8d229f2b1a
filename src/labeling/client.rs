use async_trait::async_trait;
use reqwest::Client;

use crate::{config::LabelingConfig, domain::ObjectReference};

use super::{
    inference::{build_request, parse_response},
    LabelDetector, LabelingError,
};

#[derive(Clone)]
pub struct LabelingClient {
    http: Client,
    config: LabelingConfig,
}

impl LabelingClient {
    pub fn new(http: Client, config: LabelingConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl LabelDetector for LabelingClient {
    async fn detect(
        &self,
        reference: &ObjectReference,
        min_confidence: f32,
        max_labels: u32,
    ) -> Result<Vec<String>, LabelingError> {
        let request = build_request(reference, min_confidence, max_labels);
        let mut builder = self
            .http
            .post(self.config.endpoint.clone())
            .timeout(self.config.request_timeout)
            .json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabelingError::Status { status, body });
        }

        let body = response.bytes().await?;
        let labels = parse_response(&body)?;
        tracing::debug!(
            target: "labeling",
            bucket = %reference.container_name,
            key = %reference.object_key,
            labels = ?labels,
            "labels detected"
        );
        Ok(labels)
    }
}

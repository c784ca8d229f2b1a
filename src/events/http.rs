use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::OutboundEvent;

use super::{EventPublisher, PublishError};

/// Publishes to a remote bus using the `PutEvents` entry format.
pub struct HttpEventPublisher {
    http: Client,
    endpoint: Url,
}

impl HttpEventPublisher {
    pub fn new(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }
}

#[derive(Debug, Serialize)]
struct PutEventsRequest {
    #[serde(rename = "Entries")]
    entries: Vec<PutEventsEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutEventsEntry {
    event_bus_name: String,
    detail_type: String,
    source: String,
    /// JSON document encoded as a string.
    detail: String,
    time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutEventsResponse {
    #[serde(default)]
    failed_entry_count: u32,
}

fn build_request(events: &[OutboundEvent]) -> Result<PutEventsRequest, PublishError> {
    let time = Utc::now().to_rfc3339();
    let entries = events
        .iter()
        .map(|event| -> Result<PutEventsEntry, PublishError> {
            Ok(PutEventsEntry {
                event_bus_name: event.bus_target.clone(),
                detail_type: event.detail_type.clone(),
                source: event.source.clone(),
                detail: serde_json::to_string(&event.detail)?,
                time: time.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PutEventsRequest { entries })
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, events: &[OutboundEvent]) -> Result<(), PublishError> {
        if events.is_empty() {
            return Ok(());
        }

        let request = build_request(events)?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status { status, body });
        }

        let body = response.bytes().await?;
        let result: PutEventsResponse = serde_json::from_slice(&body).unwrap_or_default();
        if result.failed_entry_count > 0 {
            tracing::warn!(
                target: "publisher",
                failed = result.failed_entry_count,
                total = events.len(),
                "event bus rejected some entries"
            );
        }
        tracing::debug!(target: "publisher", total = events.len(), "events published");
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::domain::{ClassificationResult, OutboundEvent};

use super::rules::Priority;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("target returned {status}")]
    Status { status: StatusCode },
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
}

/// Full event payload as handed to a notification target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedEvent<'a> {
    pub target: &'static str,
    pub rule: &'static str,
    pub time: DateTime<Utc>,
    pub detail_type: &'a str,
    pub source: &'a str,
    pub detail: &'a ClassificationResult,
}

impl<'a> RoutedEvent<'a> {
    pub fn new(priority: Priority, rule: &'static str, event: &'a OutboundEvent) -> Self {
        Self {
            target: priority.topic_name(),
            rule,
            time: Utc::now(),
            detail_type: &event.detail_type,
            source: &event.source,
            detail: &event.detail,
        }
    }
}

#[async_trait]
pub trait NotificationTarget: Send + Sync {
    async fn deliver(&self, event: &RoutedEvent<'_>) -> Result<(), DeliveryError>;
}

/// Posts the routed event as JSON to a webhook.
pub struct WebhookTarget {
    http: Client,
    url: Url,
    timeout: Duration,
}

impl WebhookTarget {
    pub fn new(http: Client, url: Url, timeout: Duration) -> Self {
        Self { http, url, timeout }
    }
}

#[async_trait]
impl NotificationTarget for WebhookTarget {
    async fn deliver(&self, event: &RoutedEvent<'_>) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(event)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status { status });
        }
        Ok(())
    }
}

/// Used for priorities without a webhook.
pub struct LogTarget;

#[async_trait]
impl NotificationTarget for LogTarget {
    async fn deliver(&self, event: &RoutedEvent<'_>) -> Result<(), DeliveryError> {
        tracing::info!(
            target: "routing",
            topic = event.target,
            rule = event.rule,
            key = %event.detail.object_key,
            labels = ?event.detail.labels,
            "notification"
        );
        Ok(())
    }
}

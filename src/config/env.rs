use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub labeling: LabelingConfig,
    pub bus: BusConfig,
    pub targets: TargetConfig,
    pub queue: QueueConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct LabelingConfig {
    pub endpoint: Url,
    pub api_key: Option<String>,
    /// Percentage in `0.0..=100.0`.
    pub min_confidence: f32,
    pub max_labels: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub bus_name: String,
    pub detail_type: String,
    /// Remote bus. When absent events are routed in-process.
    pub endpoint: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub high_priority_webhook: Option<Url>,
    pub medium_priority_webhook: Option<Url>,
    pub low_priority_webhook: Option<Url>,
    /// Upper bound on one delivery; always below the invocation timeout.
    pub delivery_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub invocation_timeout: Duration,
    pub max_receive_count: u32,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

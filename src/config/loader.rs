use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, BusConfig, ConfigError, DirectoryConfig, LabelingConfig, LogRotation,
    LoggingConfig, QueueConfig, TargetConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let raw_confidence = require("MIN_CONFIDENCE")?;
        let min_confidence = raw_confidence.trim().parse::<f32>().map_err(|err| {
            ConfigError::invalid("MIN_CONFIDENCE", &raw_confidence, err.to_string())
        })?;
        if !(0.0..=100.0).contains(&min_confidence) {
            return Err(ConfigError::invalid(
                "MIN_CONFIDENCE",
                &raw_confidence,
                "must be between 0 and 100",
            ));
        }

        let raw_max_labels = require("MAX_LABELS")?;
        let max_labels = raw_max_labels.trim().parse::<u32>().map_err(|err| {
            ConfigError::invalid("MAX_LABELS", &raw_max_labels, err.to_string())
        })?;
        if max_labels == 0 {
            return Err(ConfigError::invalid(
                "MAX_LABELS",
                &raw_max_labels,
                "must be a positive integer",
            ));
        }

        let labeling_timeout_ms =
            parse_or("LABELING_TIMEOUT_MS", get("LABELING_TIMEOUT_MS"), 10_000u64)?;
        ensure_positive("LABELING_TIMEOUT_MS", labeling_timeout_ms)?;

        let labeling = LabelingConfig {
            endpoint: parse_url("LABELING_ENDPOINT", &require("LABELING_ENDPOINT")?)?,
            api_key: get("LABELING_API_KEY"),
            min_confidence,
            max_labels,
            request_timeout: Duration::from_millis(labeling_timeout_ms),
        };

        let bus = BusConfig {
            bus_name: require("EVENT_BUS_NAME")?,
            detail_type: require("DETAIL_TYPE")?,
            endpoint: optional_url("EVENT_BUS_ENDPOINT", get("EVENT_BUS_ENDPOINT"))?,
        };

        let batch_size = parse_or("BATCH_SIZE", get("BATCH_SIZE"), 10usize)?;
        ensure_positive("BATCH_SIZE", batch_size as u64)?;
        let max_receive_count = parse_or("MAX_RECEIVE_COUNT", get("MAX_RECEIVE_COUNT"), 5u32)?;
        ensure_positive("MAX_RECEIVE_COUNT", u64::from(max_receive_count))?;
        let invocation_timeout_secs =
            parse_or("INVOCATION_TIMEOUT_SECS", get("INVOCATION_TIMEOUT_SECS"), 30u64)?;
        ensure_positive("INVOCATION_TIMEOUT_SECS", invocation_timeout_secs)?;

        let queue = QueueConfig {
            batch_size,
            poll_interval: Duration::from_millis(parse_or(
                "POLL_INTERVAL_MS",
                get("POLL_INTERVAL_MS"),
                500,
            )?),
            invocation_timeout: Duration::from_secs(invocation_timeout_secs),
            max_receive_count,
        };

        let raw_delivery_timeout = get("TARGET_TIMEOUT_MS");
        let delivery_timeout_ms =
            parse_or("TARGET_TIMEOUT_MS", raw_delivery_timeout.clone(), 5_000u64)?;
        ensure_positive("TARGET_TIMEOUT_MS", delivery_timeout_ms)?;
        let delivery_timeout = Duration::from_millis(delivery_timeout_ms);
        if delivery_timeout >= queue.invocation_timeout {
            return Err(ConfigError::invalid(
                "TARGET_TIMEOUT_MS",
                &raw_delivery_timeout.unwrap_or_else(|| delivery_timeout_ms.to_string()),
                "must be below INVOCATION_TIMEOUT_SECS",
            ));
        }

        let targets = TargetConfig {
            high_priority_webhook: optional_url(
                "HIGH_PRIORITY_WEBHOOK_URL",
                get("HIGH_PRIORITY_WEBHOOK_URL"),
            )?,
            medium_priority_webhook: optional_url(
                "MEDIUM_PRIORITY_WEBHOOK_URL",
                get("MEDIUM_PRIORITY_WEBHOOK_URL"),
            )?,
            low_priority_webhook: optional_url(
                "LOW_PRIORITY_WEBHOOK_URL",
                get("LOW_PRIORITY_WEBHOOK_URL"),
            )?,
            delivery_timeout,
        };

        let directories = DirectoryConfig {
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            rotation: match get("LOG_ROTATION") {
                Some(raw) => parse_rotation(&raw)?,
                None => LogRotation::Daily,
            },
        };

        Ok(Self {
            labeling,
            bus,
            targets,
            queue,
            directories,
            logging,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| ConfigError::invalid(key, &value, err.to_string())),
        None => Ok(default),
    }
}

fn ensure_positive(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(key, "0", "must be a positive integer"));
    }
    Ok(())
}

fn parse_rotation(raw: &str) -> Result<LogRotation, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "hourly" => Ok(LogRotation::Hourly),
        "daily" => Ok(LogRotation::Daily),
        "never" => Ok(LogRotation::Never),
        _ => Err(ConfigError::invalid(
            "LOG_ROTATION",
            raw,
            "expected hourly, daily or never",
        )),
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw.trim()).map_err(|err| ConfigError::invalid(key, raw, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(key, raw, "only http and https URLs are supported"));
    }
    Ok(url)
}

fn optional_url(key: &'static str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
    raw.map(|value| parse_url(key, &value)).transpose()
}

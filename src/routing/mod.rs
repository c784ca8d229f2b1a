pub mod bus;
pub mod rules;
pub mod targets;

use std::{collections::HashMap, sync::Arc};

use reqwest::Client;
use url::Url;

use crate::config::TargetConfig;

pub use bus::LocalBus;
pub use rules::{Priority, RuleSet};
pub use targets::{LogTarget, NotificationTarget, WebhookTarget};

/// One target per priority: the configured webhook, otherwise the log.
pub fn build_targets(
    http: &Client,
    config: &TargetConfig,
) -> HashMap<Priority, Arc<dyn NotificationTarget>> {
    let configured: [(Priority, &Option<Url>); 3] = [
        (Priority::High, &config.high_priority_webhook),
        (Priority::Medium, &config.medium_priority_webhook),
        (Priority::Low, &config.low_priority_webhook),
    ];

    configured
        .into_iter()
        .map(|(priority, webhook)| {
            let target: Arc<dyn NotificationTarget> = match webhook {
                Some(url) => {
                    tracing::info!(
                        target: "routing",
                        topic = %priority,
                        host = url.host_str().unwrap_or_default(),
                        "webhook target"
                    );
                    Arc::new(WebhookTarget::new(
                        http.clone(),
                        url.clone(),
                        config.delivery_timeout,
                    ))
                }
                None => Arc::new(LogTarget),
            };
            (priority, target)
        })
        .collect()
}

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::timeout;

use crate::{
    domain::OutboundEvent,
    events::{EventPublisher, PublishError},
};

use super::{
    rules::{Priority, RuleSet},
    targets::{DeliveryError, NotificationTarget, RoutedEvent},
};

/// In-process routing bus: accepts events for one bus name and fans each event
/// out to the target of every matching rule.
///
/// Each delivery is bounded by `delivery_timeout`, so a stalled target costs at
/// most that long and never fails the publish.
pub struct LocalBus {
    bus_name: String,
    rules: RuleSet,
    targets: HashMap<Priority, Arc<dyn NotificationTarget>>,
    delivery_timeout: Duration,
}

impl LocalBus {
    pub fn new(
        bus_name: impl Into<String>,
        rules: RuleSet,
        targets: HashMap<Priority, Arc<dyn NotificationTarget>>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            bus_name: bus_name.into(),
            rules,
            targets,
            delivery_timeout,
        }
    }

    async fn route(&self, event: &OutboundEvent) {
        let deliveries = self.rules.evaluate(event).into_iter().filter_map(|rule| {
            let Some(target) = self.targets.get(&rule.target) else {
                tracing::warn!(
                    target: "routing",
                    rule = rule.name,
                    topic = %rule.target,
                    "no notification target registered"
                );
                return None;
            };
            let routed = RoutedEvent::new(rule.target, rule.name, event);
            Some(async move {
                let result = match timeout(self.delivery_timeout, target.deliver(&routed)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut(self.delivery_timeout)),
                };
                (rule, result)
            })
        });

        for (rule, result) in join_all(deliveries).await {
            match result {
                Ok(()) => tracing::debug!(
                    target: "routing",
                    rule = rule.name,
                    topic = %rule.target,
                    key = %event.detail.object_key,
                    "event delivered"
                ),
                Err(err) => tracing::error!(
                    target: "routing",
                    rule = rule.name,
                    topic = %rule.target,
                    key = %event.detail.object_key,
                    error = %err,
                    "event delivery failed"
                ),
            }
        }
    }
}

#[async_trait]
impl EventPublisher for LocalBus {
    async fn publish(&self, events: &[OutboundEvent]) -> Result<(), PublishError> {
        if let Some(event) = events.iter().find(|event| event.bus_target != self.bus_name) {
            return Err(PublishError::UnknownBus(event.bus_target.clone()));
        }

        join_all(events.iter().map(|event| self.route(event))).await;
        Ok(())
    }
}

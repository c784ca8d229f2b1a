use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use crate::{
    config::AppConfig,
    domain::{
        BatchOutcome, ClassificationResult, ObjectReference, OutboundEvent, QueuedMessage,
        RecordError,
    },
    events::{EventPublisher, PublishError},
    labeling::{LabelDetector, LabelingError},
};

/// Turns a batch of object-creation notifications into label detections and a
/// single bulk publish.
pub struct MessageProcessor {
    detector: Arc<dyn LabelDetector>,
    publisher: Arc<dyn EventPublisher>,
    min_confidence: f32,
    max_labels: u32,
    bus_name: String,
    detail_type: String,
}

#[derive(Debug, Error)]
enum ItemError {
    #[error("unreadable object record: {0}")]
    Record(#[from] RecordError),
    #[error(transparent)]
    Labeling(#[from] LabelingError),
}

enum ItemResult<'a> {
    Skipped,
    Classified(ClassificationResult),
    Failed(&'a QueuedMessage, ItemError),
}

impl MessageProcessor {
    pub fn new(
        detector: Arc<dyn LabelDetector>,
        publisher: Arc<dyn EventPublisher>,
        config: &AppConfig,
    ) -> Self {
        Self {
            detector,
            publisher,
            min_confidence: config.labeling.min_confidence,
            max_labels: config.labeling.max_labels,
            bus_name: config.bus.bus_name.clone(),
            detail_type: config.bus.detail_type.clone(),
        }
    }

    /// Classifies every message concurrently and publishes the non-empty results.
    ///
    /// Classification failures are reported in the returned [`BatchOutcome`]. A
    /// publish failure is returned as an error and fails the whole batch, including
    /// messages that were classified successfully.
    pub async fn process(&self, batch: &[QueuedMessage]) -> Result<BatchOutcome, PublishError> {
        tracing::info!(target: "processor", total = batch.len(), "processing batch");

        let results = join_all(batch.iter().map(|message| self.process_message(message))).await;

        let mut outcome = BatchOutcome::default();
        let mut events = Vec::new();
        for result in results {
            match result {
                ItemResult::Skipped => {}
                ItemResult::Classified(classification) => {
                    if classification.labels.is_empty() {
                        tracing::info!(
                            target: "processor",
                            key = %classification.object_key,
                            "no labels returned for image"
                        );
                    }
                    if let Some(event) =
                        OutboundEvent::for_result(classification, &self.bus_name, &self.detail_type)
                    {
                        events.push(event);
                    }
                }
                ItemResult::Failed(message, err) => {
                    tracing::error!(
                        target: "processor",
                        identifier = %message.identifier,
                        error = %err,
                        "record failed"
                    );
                    outcome.record_failure(&message.identifier);
                }
            }
        }

        if !events.is_empty() {
            self.publisher.publish(&events).await?;
            tracing::info!(target: "processor", events = events.len(), "events published");
        }

        tracing::info!(
            target: "processor",
            total = batch.len(),
            failed = outcome.failed_identifiers.len(),
            "batch processed"
        );
        Ok(outcome)
    }

    async fn process_message<'a>(&self, message: &'a QueuedMessage) -> ItemResult<'a> {
        let reference = match message.object_reference() {
            Ok(Some(reference)) => reference,
            Ok(None) => {
                tracing::debug!(
                    target: "processor",
                    identifier = %message.identifier,
                    "message carries no object record; skipping"
                );
                return ItemResult::Skipped;
            }
            Err(err) => return ItemResult::Failed(message, err.into()),
        };

        match self.classify(&reference).await {
            Ok(labels) => ItemResult::Classified(ClassificationResult {
                object_key: reference.object_key,
                labels,
            }),
            Err(err) => ItemResult::Failed(message, err.into()),
        }
    }

    async fn classify(&self, reference: &ObjectReference) -> Result<Vec<String>, LabelingError> {
        tracing::debug!(
            target: "processor",
            bucket = %reference.container_name,
            key = %reference.object_key,
            "detecting labels"
        );
        self.detector
            .detect(reference, self.min_confidence, self.max_labels)
            .await
    }
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize, Serializer};

/// Source attached to every event the processor emits.
pub const EVENT_SOURCE: &str = "rekognition-processor";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub object_key: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub bus_target: String,
    pub detail_type: String,
    pub source: String,
    pub detail: ClassificationResult,
}

impl OutboundEvent {
    /// Builds an event for a classification, or `None` when nothing was detected.
    pub fn for_result(
        result: ClassificationResult,
        bus_target: &str,
        detail_type: &str,
    ) -> Option<Self> {
        if result.labels.is_empty() {
            return None;
        }
        Some(Self {
            bus_target: bus_target.to_string(),
            detail_type: detail_type.to_string(),
            source: EVENT_SOURCE.to_string(),
            detail: result,
        })
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.detail.labels.iter().any(|candidate| candidate == label)
    }
}

/// Identifiers the queue must redeliver; everything else in the batch is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub failed_identifiers: BTreeSet<String>,
}

impl BatchOutcome {
    pub fn record_failure(&mut self, identifier: &str) {
        self.failed_identifiers.insert(identifier.to_string());
    }

    pub fn is_failed(&self, identifier: &str) -> bool {
        self.failed_identifiers.contains(identifier)
    }

    /// Partial-batch response in queue wire form (`batchItemFailures`).
    pub fn to_response_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct BatchItemFailure<'a> {
    #[serde(rename = "itemIdentifier")]
    item_identifier: &'a str,
}

impl Serialize for BatchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "batchItemFailures")]
            batch_item_failures: Vec<BatchItemFailure<'a>>,
        }

        Wire {
            batch_item_failures: self
                .failed_identifiers
                .iter()
                .map(|id| BatchItemFailure {
                    item_identifier: id.as_str(),
                })
                .collect(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_labels_produce_no_event() {
        let result = ClassificationResult {
            object_key: "analyse/empty.jpg".into(),
            labels: vec![],
        };
        assert!(OutboundEvent::for_result(result, "bus", "rekognition-analysed-image").is_none());
    }

    #[test]
    fn event_carries_bus_and_source() {
        let result = ClassificationResult {
            object_key: "analyse/dog.jpg".into(),
            labels: vec!["Dog".into()],
        };
        let event = OutboundEvent::for_result(result, "bus", "rekognition-analysed-image").unwrap();
        assert_eq!(event.bus_target, "bus");
        assert_eq!(event.source, EVENT_SOURCE);
        assert!(event.has_label("Dog"));
        assert!(!event.has_label("dog"));
    }

    #[test]
    fn detail_uses_camel_case() {
        let result = ClassificationResult {
            object_key: "analyse/dog.jpg".into(),
            labels: vec!["Dog".into()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["objectKey"], "analyse/dog.jpg");
        assert_eq!(json["labels"][0], "Dog");
    }

    #[test]
    fn outcome_records_each_identifier_once() {
        let mut outcome = BatchOutcome::default();
        outcome.record_failure("b");
        outcome.record_failure("b");
        assert_eq!(outcome.failed_identifiers.len(), 1);
        assert_eq!(
            outcome.to_response_json(),
            r#"{"batchItemFailures":[{"itemIdentifier":"b"}]}"#
        );
    }

    #[test]
    fn empty_outcome_reports_no_failures() {
        assert_eq!(
            BatchOutcome::default().to_response_json(),
            r#"{"batchItemFailures":[]}"#
        );
    }
}

//! Declarative priority rules evaluated against each published event.
//!
//! Rules are independent: every rule that matches an event fires, so an event
//! with a `Person` label reaches both the high-priority and the catch-all
//! low-priority target.

use std::{collections::BTreeSet, fmt};

use crate::domain::OutboundEvent;

/// Notification channel a rule delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn topic_name(&self) -> &'static str {
        match self {
            Priority::High => "REKOGNITION_HIGH_PRIORITY",
            Priority::Medium => "REKOGNITION_MED_PRIORITY",
            Priority::Low => "REKOGNITION_LOW_PRIORITY",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRule {
    pub name: &'static str,
    pub match_detail_type: String,
    /// `None` matches any label set.
    pub match_labels: Option<BTreeSet<String>>,
    pub target: Priority,
}

impl PriorityRule {
    fn new(
        name: &'static str,
        detail_type: &str,
        labels: Option<&[&str]>,
        target: Priority,
    ) -> Self {
        Self {
            name,
            match_detail_type: detail_type.to_string(),
            match_labels: labels.map(|labels| labels.iter().map(|l| l.to_string()).collect()),
            target,
        }
    }

    /// Detail type must be equal; when a label filter is present at least one of
    /// the event's labels must be in it. Comparison is exact and case-sensitive.
    pub fn matches(&self, event: &OutboundEvent) -> bool {
        if event.detail_type != self.match_detail_type {
            return false;
        }
        match &self.match_labels {
            None => true,
            Some(wanted) => wanted.iter().any(|label| event.has_label(label)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PriorityRule>,
}

impl RuleSet {
    /// The three fixed rules for classification events of `detail_type`.
    pub fn priority_rules(detail_type: &str) -> Self {
        Self {
            rules: vec![
                PriorityRule::new(
                    "HighPriorityRule",
                    detail_type,
                    Some(&["Person", "Human"][..]),
                    Priority::High,
                ),
                PriorityRule::new(
                    "MediumPriorityRule",
                    detail_type,
                    Some(&["Dog"][..]),
                    Priority::Medium,
                ),
                PriorityRule::new("LowPriorityRule", detail_type, None, Priority::Low),
            ],
        }
    }

    pub fn rules(&self) -> &[PriorityRule] {
        &self.rules
    }

    /// All matching rules, in rule-set order.
    pub fn evaluate(&self, event: &OutboundEvent) -> Vec<&PriorityRule> {
        self.rules.iter().filter(|rule| rule.matches(event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{types::EVENT_SOURCE, ClassificationResult};

    const DETAIL_TYPE: &str = "rekognition-analysed-image";

    fn event(detail_type: &str, labels: &[&str]) -> OutboundEvent {
        OutboundEvent {
            bus_target: "bus".into(),
            detail_type: detail_type.into(),
            source: EVENT_SOURCE.into(),
            detail: ClassificationResult {
                object_key: "analyse/image.jpg".into(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
            },
        }
    }

    fn targets(rules: &RuleSet, event: &OutboundEvent) -> Vec<Priority> {
        rules.evaluate(event).into_iter().map(|rule| rule.target).collect()
    }

    #[test]
    fn person_fires_high_and_low() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["Person", "Cat"]));
        assert_eq!(matched, vec![Priority::High, Priority::Low]);
    }

    #[test]
    fn human_alone_fires_high() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["Human"]));
        assert_eq!(matched, vec![Priority::High, Priority::Low]);
    }

    #[test]
    fn dog_fires_medium_and_low() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["Dog"]));
        assert_eq!(matched, vec![Priority::Medium, Priority::Low]);
    }

    #[test]
    fn person_and_dog_fire_every_rule() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["Dog", "Person"]));
        assert_eq!(matched, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn cat_fires_only_low() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["Cat"]));
        assert_eq!(matched, vec![Priority::Low]);
    }

    #[test]
    fn label_match_is_case_sensitive() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let matched = targets(&rules, &event(DETAIL_TYPE, &["person", "dog"]));
        assert_eq!(matched, vec![Priority::Low]);
    }

    #[test]
    fn other_detail_type_matches_nothing() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        assert!(rules.evaluate(&event("something-else", &["Person"])).is_empty());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let rules = RuleSet::priority_rules(DETAIL_TYPE);
        let event = event(DETAIL_TYPE, &["Person", "Dog", "Cat"]);
        let first = targets(&rules, &event);
        for _ in 0..5 {
            assert_eq!(targets(&rules, &event), first);
        }
    }

    #[test]
    fn topic_names() {
        assert_eq!(Priority::High.to_string(), "REKOGNITION_HIGH_PRIORITY");
        assert_eq!(Priority::Medium.topic_name(), "REKOGNITION_MED_PRIORITY");
        assert_eq!(Priority::Low.topic_name(), "REKOGNITION_LOW_PRIORITY");
    }
}

//! Blocking reason classification.
//!
//! Reasons are free text produced by the cluster. Only a small set of them
//! explain a wait without anyone having to look; the rest must be surfaced.
//! Matchers are kept as an ordered, configurable list so new phrasings can be
//! added from configuration alone.

use ciwatch_id::Label;
use regex::Regex;
use serde::Serialize;

use crate::error::MonitorError;
use crate::thresholds::Thresholds;

/// Outcome of classifying a blocking reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum BlockingClassification {
    /// A benign wait (another build of the same job, an upstream build...).
    AllowedWait,

    /// The item waits for an executor carrying this label.
    NeedsCapacity(Label),

    /// Nothing explains the wait.
    Unclassified,
}

/// A single reason pattern.
#[derive(Debug, Clone)]
pub enum ReasonMatcher {
    /// Matching reasons are benign.
    Allowed(Regex),

    /// Matching reasons name a short label in capture group 1.
    Capacity(Regex),
}

impl ReasonMatcher {
    /// Compile an allowed-reason pattern.
    pub fn allowed(pattern: &str) -> Result<Self, MonitorError> {
        Ok(Self::Allowed(compile(pattern)?))
    }

    /// Compile a capacity pattern. The pattern must have a capture group.
    pub fn capacity(pattern: &str) -> Result<Self, MonitorError> {
        let regex = compile(pattern)?;
        if regex.captures_len() < 2 {
            return Err(MonitorError::MissingLabelGroup(pattern.to_string()));
        }
        Ok(Self::Capacity(regex))
    }

    fn classify(&self, reason: &str) -> Option<BlockingClassification> {
        match self {
            Self::Allowed(regex) => regex
                .is_match(reason)
                .then_some(BlockingClassification::AllowedWait),
            Self::Capacity(regex) => regex
                .captures(reason)
                .and_then(|caps| caps.get(1))
                .and_then(|m| Label::parse(m.as_str()).ok())
                .map(BlockingClassification::NeedsCapacity),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, MonitorError> {
    Regex::new(pattern).map_err(|source| MonitorError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Ordered reason classifier. Allowed matchers always precede capacity ones.
#[derive(Debug, Clone)]
pub struct Classifier {
    matchers: Vec<ReasonMatcher>,
}

impl Classifier {
    /// Build a classifier from allowed and capacity pattern lists.
    pub fn new<A, C>(allowed: A, capacity: C) -> Result<Self, MonitorError>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut matchers = Vec::new();
        for pattern in allowed {
            matchers.push(ReasonMatcher::allowed(pattern.as_ref())?);
        }
        for pattern in capacity {
            matchers.push(ReasonMatcher::capacity(pattern.as_ref())?);
        }
        Ok(Self { matchers })
    }

    /// Build a classifier from the patterns configured in `thresholds`.
    pub fn from_thresholds(thresholds: &Thresholds) -> Result<Self, MonitorError> {
        Self::new(&thresholds.allowed_reasons, &thresholds.capacity_reasons)
    }

    /// Classify a reason. The first matching matcher wins.
    pub fn classify(&self, reason: &str) -> BlockingClassification {
        self.matchers
            .iter()
            .find_map(|m| m.classify(reason))
            .unwrap_or(BlockingClassification::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn default_classifier() -> Classifier {
        Classifier::from_thresholds(&Thresholds::default()).unwrap()
    }

    #[rstest]
    #[case("Build #17 is already in progress (ETA: 3 min 2 sec)")]
    #[case("Build #5 is already in progress")]
    #[case("Build #1,204 is already in progress")]
    #[case("Upstream project core-lib is already building.")]
    #[case("Blocking job nightly_db is running.")]
    fn test_allowed_reasons(#[case] reason: &str) {
        assert_eq!(
            default_classifier().classify(reason),
            BlockingClassification::AllowedWait
        );
    }

    #[rstest]
    #[case("Waiting for next available executor on linux_large", "linux_large")]
    #[case("Waiting for next available executor on ‘docker’", "docker")]
    #[case("Waiting for next available executor on 'mac-arm64'", "mac-arm64")]
    fn test_capacity_reasons(#[case] reason: &str, #[case] label: &str) {
        assert_eq!(
            default_classifier().classify(reason),
            BlockingClassification::NeedsCapacity(Label::parse(label).unwrap())
        );
    }

    #[rstest]
    #[case("")]
    #[case("some custom hold")]
    #[case("Upstream project core-lib is already building. Extra")]
    #[case("There are no nodes with the label ‘gpu’")]
    fn test_unclassified_reasons(#[case] reason: &str) {
        assert_eq!(
            default_classifier().classify(reason),
            BlockingClassification::Unclassified
        );
    }

    #[test]
    fn test_allowed_wins_over_capacity() {
        let classifier = Classifier::new(["executor"], [r"executor on (\w+)"]).unwrap();
        assert_eq!(
            classifier.classify("Waiting for next available executor on gpu"),
            BlockingClassification::AllowedWait
        );
    }

    #[test]
    fn test_custom_pattern_extends_without_code_change() {
        let classifier = Classifier::new([r"^Waiting for quiet period"], Vec::<String>::new()).unwrap();
        assert_eq!(
            classifier.classify("Waiting for quiet period to expire"),
            BlockingClassification::AllowedWait
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Classifier::new(["(unclosed"], Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidPattern { .. }));
    }

    #[test]
    fn test_capacity_pattern_requires_group() {
        let err = Classifier::new(Vec::<String>::new(), ["no group here"]).unwrap_err();
        assert!(matches!(err, MonitorError::MissingLabelGroup(_)));
    }

    proptest! {
        #[test]
        fn build_in_progress_is_always_allowed(n in 0u32..1_000_000, tail in "[ -~]{0,20}") {
            let reason = format!("Build #{n} is already in progress{tail}");
            prop_assert_eq!(default_classifier().classify(&reason), BlockingClassification::AllowedWait);
        }

        #[test]
        fn executor_wait_extracts_label(label in "[a-z][a-z0-9_]{0,15}") {
            let reason = format!("Waiting for next available executor on {label}");
            let expected = BlockingClassification::NeedsCapacity(Label::parse(&label).unwrap());
            prop_assert_eq!(default_classifier().classify(&reason), expected);
        }
    }
}

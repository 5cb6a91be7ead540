//! Feedback Collector: records analyst/chat corrections against past
//! classifications and signals when enough fresh feedback has
//! accumulated to warrant retraining.
//!
//! Storage is an in-memory append-only log keyed by an opaque id
//! minted from website id and timestamp, mirroring the id-minting
//! style already used for `Alert::alert_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteward_core::Classification;
use std::collections::HashMap;
use std::sync::Mutex;

/// Minimum number of feedback entries in the trailing window required
/// to signal that retraining may be worthwhile.
pub const RETRAINING_SIGNAL_THRESHOLD: usize = 10;

/// The trailing window over which the retraining signal is evaluated.
pub const RETRAINING_SIGNAL_WINDOW: chrono::Duration = chrono::Duration::days(7);

/// What a piece of feedback asserts about a past classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// An analyst corrected a classification's label outright.
    ClassificationCorrection,
    /// An analyst adjusted the confidence without changing the label.
    ConfidenceAdjustment,
    /// The pipeline alerted on something that was actually benign.
    FalsePositive,
    /// The pipeline missed something that was actually defacement.
    FalseNegative,
    /// Feedback attached to a specific delivered alert rather than the
    /// underlying snapshot classification.
    AlertFeedback,
    /// An analyst flagged a classification for manual review without
    /// (yet) asserting a corrected label.
    ManualReview,
}

/// Where a piece of feedback originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// A human analyst reviewing the alert or snapshot directly.
    HumanAnalyst,
    /// An automated validation pass (e.g. a scheduled re-check).
    AutomatedValidation,
    /// Submitted through a chat interaction (the Slack command surface).
    ChatInteraction,
    /// Submitted by an external system integration.
    ExternalSystem,
    /// The pipeline itself revising a prior verdict (e.g. on re-scrape).
    SelfCorrection,
}

/// A single feedback record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// Opaque id, unique per record.
    pub feedback_id: String,
    /// Website the feedback concerns.
    pub website_id: String,
    /// Snapshot the original verdict was produced for, if known.
    pub snapshot_id: Option<String>,
    /// Alert this feedback responds to, if it was alert-scoped.
    pub alert_id: Option<String>,
    /// What kind of feedback this is.
    pub kind: FeedbackKind,
    /// Where the feedback came from.
    pub source: FeedbackSource,
    /// The label the pipeline originally produced, if known.
    pub original_label: Option<Classification>,
    /// The confidence score the pipeline originally produced, if known.
    pub original_confidence: Option<f64>,
    /// The label the feedback asserts is correct.
    pub corrected_label: Classification,
    /// The confidence the feedback asserts is correct, if supplied.
    pub corrected_confidence: Option<f64>,
    /// Free-text reasoning from the submitter.
    pub reasoning: String,
    /// Identifier of the submitting analyst, if the source is human.
    pub analyst_id: Option<String>,
    /// Free-form metadata (e.g. review-tool ids, chat thread refs).
    pub metadata: HashMap<String, String>,
    /// When the feedback was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the feedback was folded into performance metrics, if it
    /// has been processed yet.
    pub processed_at: Option<DateTime<Utc>>,
}

/// Everything needed to record one piece of feedback, grouped so
/// `FeedbackCollector::record` doesn't take a dozen positional
/// arguments.
#[derive(Debug, Clone, Default)]
pub struct FeedbackInput {
    /// Website the feedback concerns.
    pub website_id: String,
    /// Snapshot the original verdict was produced for, if known.
    pub snapshot_id: Option<String>,
    /// Alert this feedback responds to, if it was alert-scoped.
    pub alert_id: Option<String>,
    /// What kind of feedback this is.
    pub kind: Option<FeedbackKind>,
    /// Where the feedback came from.
    pub source: Option<FeedbackSource>,
    /// The label the pipeline originally produced, if known.
    pub original_label: Option<Classification>,
    /// The confidence score the pipeline originally produced, if known.
    pub original_confidence: Option<f64>,
    /// The label the feedback asserts is correct.
    pub corrected_label: Option<Classification>,
    /// The confidence the feedback asserts is correct, if supplied.
    pub corrected_confidence: Option<f64>,
    /// Free-text reasoning from the submitter.
    pub reasoning: String,
    /// Identifier of the submitting analyst, if the source is human.
    pub analyst_id: Option<String>,
    /// Free-form metadata (e.g. review-tool ids, chat thread refs).
    pub metadata: HashMap<String, String>,
}

/// Collects feedback and exposes a retraining signal derived from its
/// recent volume.
#[derive(Default)]
pub struct FeedbackCollector {
    records: Mutex<Vec<Feedback>>,
}

impl FeedbackCollector {
    /// Build an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one piece of feedback and return its minted id. `kind`
    /// defaults to `ClassificationCorrection` and `source` to
    /// `HumanAnalyst` when not supplied, matching the most common
    /// submission path (an analyst correcting a label in the review UI).
    pub fn record(&self, input: FeedbackInput, submitted_at: DateTime<Utc>) -> String {
        let feedback_id = format!("feedback-{}-{}", input.website_id, submitted_at.timestamp_millis());
        let record = Feedback {
            feedback_id: feedback_id.clone(),
            website_id: input.website_id,
            snapshot_id: input.snapshot_id,
            alert_id: input.alert_id,
            kind: input.kind.unwrap_or(FeedbackKind::ClassificationCorrection),
            source: input.source.unwrap_or(FeedbackSource::HumanAnalyst),
            original_label: input.original_label,
            original_confidence: input.original_confidence,
            corrected_label: input.corrected_label.unwrap_or(Classification::Unclear),
            corrected_confidence: input.corrected_confidence,
            reasoning: input.reasoning,
            analyst_id: input.analyst_id,
            metadata: input.metadata,
            submitted_at,
            processed_at: None,
        };
        self.records.lock().expect("feedback lock poisoned").push(record);
        feedback_id
    }

    /// Mark a feedback record as folded into performance metrics.
    pub fn mark_processed(&self, feedback_id: &str, processed_at: DateTime<Utc>) {
        let mut records = self.records.lock().expect("feedback lock poisoned");
        if let Some(record) = records.iter_mut().find(|f| f.feedback_id == feedback_id) {
            record.processed_at = Some(processed_at);
        }
    }

    /// All feedback recorded so far, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Feedback> {
        self.records.lock().expect("feedback lock poisoned").clone()
    }

    /// Count of entries submitted within `window` ending at `now`.
    #[must_use]
    pub fn count_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        self.records
            .lock()
            .expect("feedback lock poisoned")
            .iter()
            .filter(|f| now - f.submitted_at < window)
            .count()
    }

    /// Whether the trailing-7-day feedback volume crosses the
    /// retraining threshold.
    #[must_use]
    pub fn should_signal_retraining(&self, now: DateTime<Utc>) -> bool {
        self.count_within(now, RETRAINING_SIGNAL_WINDOW) >= RETRAINING_SIGNAL_THRESHOLD
    }

    /// Per-website counts of feedback kinds, for quick triage.
    #[must_use]
    pub fn counts_by_website(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for record in self.records.lock().expect("feedback lock poisoned").iter() {
            *counts.entry(record.website_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(website_id: &str, corrected_label: Classification, reasoning: &str) -> FeedbackInput {
        FeedbackInput {
            website_id: website_id.to_string(),
            corrected_label: Some(corrected_label),
            reasoning: reasoning.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn retraining_signal_fires_once_threshold_crossed_in_window() {
        let collector = FeedbackCollector::new();
        let now = Utc::now();
        for i in 0..9 {
            collector.record(
                FeedbackInput {
                    kind: Some(FeedbackKind::FalsePositive),
                    original_label: Some(Classification::Defacement),
                    ..input("site-1", Classification::Benign, "not actually defaced")
                },
                now - chrono::Duration::hours(i),
            );
        }
        assert!(!collector.should_signal_retraining(now));

        collector.record(
            FeedbackInput {
                kind: Some(FeedbackKind::FalsePositive),
                original_label: Some(Classification::Defacement),
                ..input("site-1", Classification::Benign, "tenth entry")
            },
            now,
        );
        assert!(collector.should_signal_retraining(now));
    }

    #[test]
    fn stale_feedback_outside_window_does_not_count() {
        let collector = FeedbackCollector::new();
        let now = Utc::now();
        for _ in 0..20 {
            collector.record(
                FeedbackInput {
                    kind: Some(FeedbackKind::ManualReview),
                    source: Some(FeedbackSource::ChatInteraction),
                    ..input("site-1", Classification::Benign, "old")
                },
                now - chrono::Duration::days(30),
            );
        }
        assert!(!collector.should_signal_retraining(now));
    }

    #[test]
    fn feedback_ids_are_unique_per_record() {
        let collector = FeedbackCollector::new();
        let now = Utc::now();
        let id1 = collector.record(input("site-1", Classification::Benign, "a"), now);
        let id2 = collector.record(
            input("site-1", Classification::Benign, "b"),
            now + chrono::Duration::milliseconds(1),
        );
        assert_ne!(id1, id2);
    }

    #[test]
    fn mark_processed_sets_the_timestamp() {
        let collector = FeedbackCollector::new();
        let now = Utc::now();
        let id = collector.record(input("site-1", Classification::Benign, "a"), now);
        collector.mark_processed(&id, now + chrono::Duration::seconds(1));
        let record = collector.all().into_iter().find(|f| f.feedback_id == id).unwrap();
        assert!(record.processed_at.is_some());
    }

    #[test]
    fn unprocessed_metadata_defaults_are_sane() {
        let collector = FeedbackCollector::new();
        let now = Utc::now();
        collector.record(input("site-1", Classification::Unclear, "flag for review"), now);
        let record = collector.all().remove(0);
        assert_eq!(record.kind, FeedbackKind::ClassificationCorrection);
        assert_eq!(record.source, FeedbackSource::HumanAnalyst);
        assert!(record.processed_at.is_none());
    }
}

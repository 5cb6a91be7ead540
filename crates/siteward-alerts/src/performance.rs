//! Performance Tracker: precision/recall/F1/false-positive/false-negative
//! rates over a rolling window, plus a trend series across consecutive
//! windows.
//!
//! `Defacement` is treated as the positive class; everything else is
//! negative. Each trend window gets its own genuinely distinct
//! `[start, end)` slice of the underlying outcome log rather than
//! recomputing the same slice repeatedly.

use chrono::{DateTime, Utc};
use siteward_core::Classification;
use std::sync::Mutex;

/// Default window over which a single metrics snapshot is computed.
pub const DEFAULT_METRICS_WINDOW: chrono::Duration = chrono::Duration::days(30);

/// Default number of consecutive windows in a trend series.
pub const DEFAULT_TREND_WINDOW_COUNT: usize = 12;

/// Default width of each window in a trend series.
pub const DEFAULT_TREND_WINDOW_WIDTH: chrono::Duration = chrono::Duration::days(7);

/// One classification outcome against known ground truth.
#[derive(Debug, Clone)]
pub struct LabeledOutcome {
    /// What the pipeline predicted.
    pub predicted: Classification,
    /// What was actually true, established later (analyst review, no
    /// follow-up report, etc.).
    pub actual: Classification,
    /// When the prediction was made.
    pub at: DateTime<Utc>,
}

/// Precision/recall/F1/FPR/FNR computed over some window, with
/// `Defacement` as the positive class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMetrics {
    /// True positives: predicted Defacement, actually Defacement.
    pub true_positives: usize,
    /// False positives: predicted Defacement, actually not.
    pub false_positives: usize,
    /// True negatives: predicted not Defacement, actually not.
    pub true_negatives: usize,
    /// False negatives: predicted not Defacement, actually Defacement.
    pub false_negatives: usize,
    /// `tp / (tp + fp)`; `0.0` when no positive predictions were made.
    pub precision: f64,
    /// `tp / (tp + fn)`; `0.0` when no actual positives existed.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// `fp / (fp + tn)`.
    pub false_positive_rate: f64,
    /// `fn / (fn + tp)`.
    pub false_negative_rate: f64,
    /// Total outcomes the metrics were computed over.
    pub total_count: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn metrics_for(outcomes: &[LabeledOutcome]) -> PerformanceMetrics {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for outcome in outcomes {
        let predicted_positive = outcome.predicted == Classification::Defacement;
        let actual_positive = outcome.actual == Classification::Defacement;
        match (predicted_positive, actual_positive) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    PerformanceMetrics {
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
        precision,
        recall,
        f1,
        false_positive_rate: ratio(fp, fp + tn),
        false_negative_rate: ratio(fn_, fn_ + tp),
        total_count: outcomes.len(),
    }
}

/// One window's metrics, tagged with its boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    /// Inclusive start of the window.
    pub start: DateTime<Utc>,
    /// Exclusive end of the window.
    pub end: DateTime<Utc>,
    /// Metrics computed over `[start, end)`.
    pub metrics: PerformanceMetrics,
}

/// Accumulates labeled outcomes and computes metrics/trends over them.
#[derive(Default)]
pub struct PerformanceTracker {
    outcomes: Mutex<Vec<LabeledOutcome>>,
}

impl PerformanceTracker {
    /// Build an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one labeled outcome.
    pub fn record(&self, outcome: LabeledOutcome) {
        self.outcomes.lock().expect("performance lock poisoned").push(outcome);
    }

    /// Metrics over the `window` ending at `now` (defaults to
    /// [`DEFAULT_METRICS_WINDOW`] when callers want the standard view).
    #[must_use]
    pub fn metrics(&self, now: DateTime<Utc>, window: chrono::Duration) -> PerformanceMetrics {
        let outcomes = self.outcomes.lock().expect("performance lock poisoned");
        let in_window: Vec<LabeledOutcome> = outcomes
            .iter()
            .filter(|o| now - o.at < window && now - o.at >= chrono::Duration::zero())
            .cloned()
            .collect();
        metrics_for(&in_window)
    }

    /// A trend series of `window_count` consecutive, non-overlapping
    /// windows of `window_width` each, oldest first, ending at `now`.
    #[must_use]
    pub fn trend(
        &self,
        now: DateTime<Utc>,
        window_count: usize,
        window_width: chrono::Duration,
    ) -> Vec<TrendPoint> {
        let outcomes = self.outcomes.lock().expect("performance lock poisoned");
        let mut points = Vec::with_capacity(window_count);

        for i in (0..window_count).rev() {
            let end = now - window_width * i as i32;
            let start = end - window_width;
            let slice: Vec<LabeledOutcome> = outcomes
                .iter()
                .filter(|o| o.at >= start && o.at < end)
                .cloned()
                .collect();
            points.push(TrendPoint {
                start,
                end,
                metrics: metrics_for(&slice),
            });
        }

        points
    }

    /// Convenience wrapper for the standard trend series.
    #[must_use]
    pub fn default_trend(&self, now: DateTime<Utc>) -> Vec<TrendPoint> {
        self.trend(now, DEFAULT_TREND_WINDOW_COUNT, DEFAULT_TREND_WINDOW_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(predicted: Classification, actual: Classification, at: DateTime<Utc>) -> LabeledOutcome {
        LabeledOutcome { predicted, actual, at }
    }

    #[test]
    fn metrics_match_hand_computed_confusion_matrix() {
        let tracker = PerformanceTracker::new();
        let now = Utc::now();
        tracker.record(outcome(Classification::Defacement, Classification::Defacement, now));
        tracker.record(outcome(Classification::Defacement, Classification::Benign, now));
        tracker.record(outcome(Classification::Benign, Classification::Benign, now));
        tracker.record(outcome(Classification::Benign, Classification::Defacement, now));

        let metrics = tracker.metrics(now, DEFAULT_METRICS_WINDOW);
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_positives, 1);
        assert_eq!(metrics.true_negatives, 1);
        assert_eq!(metrics.false_negatives, 1);
        assert!((metrics.precision - 0.5).abs() < 1e-9);
        assert!((metrics.recall - 0.5).abs() < 1e-9);
        assert!((metrics.f1 - 0.5).abs() < 1e-9);
        assert_eq!(metrics.total_count, 4);
    }

    #[test]
    fn outcomes_outside_window_are_excluded() {
        let tracker = PerformanceTracker::new();
        let now = Utc::now();
        tracker.record(outcome(
            Classification::Defacement,
            Classification::Defacement,
            now - chrono::Duration::days(60),
        ));
        let metrics = tracker.metrics(now, DEFAULT_METRICS_WINDOW);
        assert_eq!(metrics.total_count, 0);
    }

    #[test]
    fn trend_windows_have_distinct_non_overlapping_boundaries() {
        let tracker = PerformanceTracker::new();
        let now = Utc::now();
        let points = tracker.default_trend(now);
        assert_eq!(points.len(), DEFAULT_TREND_WINDOW_COUNT);

        for pair in points.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "windows must be contiguous");
            assert!(pair[0].start < pair[1].start, "windows must move forward in time");
        }
        assert_eq!(points.last().unwrap().end, now);
    }

    #[test]
    fn each_trend_point_only_counts_outcomes_in_its_own_window() {
        let tracker = PerformanceTracker::new();
        let now = Utc::now();
        // One outcome per distinct week in the past, oldest-first.
        for week in 0..DEFAULT_TREND_WINDOW_COUNT {
            tracker.record(outcome(
                Classification::Defacement,
                Classification::Defacement,
                now - DEFAULT_TREND_WINDOW_WIDTH * week as i32 - chrono::Duration::hours(1),
            ));
        }
        let points = tracker.default_trend(now);
        for point in &points {
            assert_eq!(point.metrics.total_count, 1, "each window should see exactly its own outcome");
        }
    }
}

//! Weighted fusion of classifier signals into one confidence score,
//! with a per-factor breakdown and cross-validation term.
//!
//! A pure function over a small input struct, pairing the scoring
//! function with a breakdown struct the caller can inspect alongside
//! the final verdict.

use crate::model::{Classification, ConfidenceFactors, ConfidenceLevel, ThreatCategory};

/// Fixed factor weights. They intentionally sum to 0.95, not 1.0 —
/// the calculator does not renormalize; the final clamp bounds the
/// consequence.
const WEIGHT_RULE_MATCH_STRENGTH: f64 = 0.20;
const WEIGHT_PATTERN_COVERAGE: f64 = 0.20;
const WEIGHT_SEMANTIC_DRIFT: f64 = 0.15;
const WEIGHT_BEHAVIORAL_ANOMALY: f64 = 0.15;
const WEIGHT_AI_CERTAINTY: f64 = 0.10;
const WEIGHT_HISTORICAL_ACCURACY: f64 = 0.10;
const WEIGHT_CROSS_VALIDATION: f64 = 0.10;

/// Default rolling historical-accuracy baseline before any feedback
/// has been recorded.
pub const DEFAULT_HISTORICAL_ACCURACY: f64 = 0.7;

/// Inputs to the confidence model. Each field is `None` when that
/// sub-component produced no signal.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceInputs {
    /// Rule engine confidence, if the rule engine ran.
    pub rule_confidence: Option<f64>,
    /// Distinct threat categories the rule engine triggered.
    pub distinct_rule_categories: usize,
    /// Main-content cosine similarity from the semantic signal.
    pub semantic_main_content_similarity: Option<f64>,
    /// Behavioral analyzer's score.
    pub behavioral_score: Option<f64>,
    /// AI classifier's confidence, if it ran.
    pub ai_confidence: Option<f64>,
    /// Rolling historical accuracy baseline (starts at 0.7).
    pub historical_accuracy: f64,
    /// AI and rule engine labels, for the cross-validation factor.
    pub ai_label: Option<Classification>,
    /// Rule engine's label, for the cross-validation factor.
    pub rule_label: Option<Classification>,
    /// Threat category used for the severity-category multiplier.
    pub category: ThreatCategory,
}

/// Output of the confidence model.
#[derive(Debug, Clone)]
pub struct ConfidenceOutcome {
    /// Final clamped confidence score, in `[0,1]`.
    pub score: f64,
    /// Band derived from `score`.
    pub level: ConfidenceLevel,
    /// Per-factor breakdown retained for audit/debugging.
    pub factors: ConfidenceFactors,
}

/// Compute the fused confidence score.
#[must_use]
pub fn calculate_confidence(inputs: &ConfidenceInputs) -> ConfidenceOutcome {
    let factors = ConfidenceFactors {
        rule_match_strength: inputs.rule_confidence.unwrap_or(0.0),
        pattern_coverage: (inputs.distinct_rule_categories as f64 / 3.0).min(1.0),
        semantic_drift: inputs
            .semantic_main_content_similarity
            .map(|sim| 1.0 - sim)
            .unwrap_or(0.0),
        behavioral_anomaly: inputs.behavioral_score.unwrap_or(0.0),
        ai_certainty: inputs.ai_confidence.unwrap_or(0.0),
        historical_accuracy: inputs.historical_accuracy,
        cross_validation: match (inputs.ai_label, inputs.rule_label) {
            (Some(ai), Some(rule)) if ai == rule => 1.0,
            (Some(_), Some(_)) => 0.5,
            _ => 0.5,
        },
    };

    let weighted_sum = factors.rule_match_strength * WEIGHT_RULE_MATCH_STRENGTH
        + factors.pattern_coverage * WEIGHT_PATTERN_COVERAGE
        + factors.semantic_drift * WEIGHT_SEMANTIC_DRIFT
        + factors.behavioral_anomaly * WEIGHT_BEHAVIORAL_ANOMALY
        + factors.ai_certainty * WEIGHT_AI_CERTAINTY
        + factors.historical_accuracy * WEIGHT_HISTORICAL_ACCURACY
        + factors.cross_validation * WEIGHT_CROSS_VALIDATION;

    let mut score = weighted_sum * inputs.category.severity_multiplier();

    let high_factor_count = [
        factors.rule_match_strength,
        factors.pattern_coverage,
        factors.semantic_drift,
        factors.behavioral_anomaly,
        factors.ai_certainty,
        factors.historical_accuracy,
        factors.cross_validation,
    ]
    .iter()
    .filter(|v| **v > 0.7)
    .count();

    if high_factor_count >= 3 {
        score *= 1.2;
    }

    let score = score.clamp(0.0, 1.0);

    ConfidenceOutcome {
        score,
        level: ConfidenceLevel::from_score(score),
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn confidence_is_idempotent_for_identical_inputs() {
        let inputs = ConfidenceInputs {
            rule_confidence: Some(0.9),
            distinct_rule_categories: 2,
            semantic_main_content_similarity: Some(0.2),
            behavioral_score: Some(0.5),
            ai_confidence: Some(0.8),
            historical_accuracy: 0.7,
            ai_label: Some(Classification::Defacement),
            rule_label: Some(Classification::Defacement),
            category: ThreatCategory::Defacement,
        };
        let a = calculate_confidence(&inputs);
        let b = calculate_confidence(&inputs);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn score_is_always_within_unit_interval() {
        let inputs = ConfidenceInputs {
            rule_confidence: Some(1.0),
            distinct_rule_categories: 7,
            semantic_main_content_similarity: Some(0.0),
            behavioral_score: Some(1.0),
            ai_confidence: Some(1.0),
            historical_accuracy: 1.0,
            ai_label: Some(Classification::Defacement),
            rule_label: Some(Classification::Defacement),
            category: ThreatCategory::Defacement,
        };
        let outcome = calculate_confidence(&inputs);
        assert!((0.0..=1.0).contains(&outcome.score));
    }

    #[test]
    fn all_signals_missing_collapses_to_zero() {
        let inputs = ConfidenceInputs {
            historical_accuracy: 0.0,
            category: ThreatCategory::Unknown,
            ..Default::default()
        };
        let outcome = calculate_confidence(&inputs);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.level, ConfidenceLevel::VeryLow);
    }

    proptest! {
        #[test]
        fn score_stays_within_unit_interval_for_arbitrary_inputs(
            rule_confidence in 0.0f64..=1.0,
            distinct_rule_categories in 0usize..10,
            semantic_similarity in 0.0f64..=1.0,
            behavioral_score in 0.0f64..=1.0,
            ai_confidence in 0.0f64..=1.0,
            historical_accuracy in 0.0f64..=1.0,
            category_idx in 0usize..8,
        ) {
            let category = [
                ThreatCategory::Defacement,
                ThreatCategory::Cryptojacking,
                ThreatCategory::SqlInjection,
                ThreatCategory::Xss,
                ThreatCategory::Backdoor,
                ThreatCategory::Phishing,
                ThreatCategory::Malware,
                ThreatCategory::Unknown,
            ][category_idx];

            let inputs = ConfidenceInputs {
                rule_confidence: Some(rule_confidence),
                distinct_rule_categories,
                semantic_main_content_similarity: Some(semantic_similarity),
                behavioral_score: Some(behavioral_score),
                ai_confidence: Some(ai_confidence),
                historical_accuracy,
                ai_label: Some(Classification::Defacement),
                rule_label: Some(Classification::Unclear),
                category,
            };
            let outcome = calculate_confidence(&inputs);
            prop_assert!((0.0..=1.0).contains(&outcome.score));
        }
    }

    #[test]
    fn unknown_category_applies_half_multiplier() {
        let base = ConfidenceInputs {
            rule_confidence: Some(0.9),
            distinct_rule_categories: 1,
            historical_accuracy: 0.7,
            category: ThreatCategory::Defacement,
            ..Default::default()
        };
        let unknown = ConfidenceInputs {
            category: ThreatCategory::Unknown,
            ..base.clone()
        };
        let defacement_outcome = calculate_confidence(&base);
        let unknown_outcome = calculate_confidence(&unknown);
        assert!(unknown_outcome.score < defacement_outcome.score);
    }
}

//! Classification pipeline: runs the four sub-classifiers, fuses their
//! signals into one confidence score, and takes a weighted vote on the
//! final label.
//!
//! The rule engine, behavioral analyzer, and semantic signal are pure
//! CPU-bound functions and run inline; only the AI classifier does
//! I/O, and its branch is isolated via `tokio::join!` so a failed or
//! malformed completion degrades to "no signal" rather than failing
//! the whole pass.

use crate::ai_classifier::{AiClassifier, PromptKind};
use crate::behavioral::{BehavioralAnalyzer, BehavioralResult, StructureSummary};
use crate::confidence::{calculate_confidence, ConfidenceInputs};
use crate::model::{
    Classification, ClassificationResult, ClassifierWeights, ConfidenceLevel, ConsensusMetrics,
    PipelineResult, RiskLevel, RuleBasedResult, SemanticResult, ThreatCategory, ThreatIndicator,
};
use crate::rule_engine::RuleEngine;
use crate::vectorizer::cosine_similarity;
use std::collections::HashMap;
use std::time::Instant;
use tracing::warn;

/// Everything the pipeline needs to run one classification pass over a
/// snapshot.
pub struct PipelineInput<'a> {
    /// Site URL, used in AI prompts and as rule-engine context.
    pub url: &'a str,
    /// Extracted textual fragments to run the rule engine and AI
    /// classifier over.
    pub fragments: &'a [String],
    /// DOM/resource structure summary for the behavioral analyzer.
    pub structure: &'a StructureSummary,
    /// Current main-content embedding, if one was computed.
    pub current_vector: Option<&'a [f32]>,
    /// Prior main-content embedding to diff against, if one exists.
    pub baseline_vector: Option<&'a [f32]>,
    /// Rolling historical accuracy baseline fed into the confidence model.
    pub historical_accuracy: f64,
}

/// Orchestrates the rule engine, behavioral analyzer, semantic signal,
/// and (optionally) an AI classifier into one fused `PipelineResult`.
pub struct ClassificationPipeline {
    rule_engine: RuleEngine,
    behavioral_analyzer: BehavioralAnalyzer,
    ai_classifier: Option<AiClassifier>,
    weights: ClassifierWeights,
}

impl ClassificationPipeline {
    /// Build a pipeline with default classifier weights. `ai_classifier`
    /// is optional: when absent, the AI branch contributes no vote and
    /// no signal, same as any other sub-classifier that errors out.
    #[must_use]
    pub fn new(ai_classifier: Option<AiClassifier>) -> Self {
        Self {
            rule_engine: RuleEngine,
            behavioral_analyzer: BehavioralAnalyzer,
            ai_classifier,
            weights: ClassifierWeights::default(),
        }
    }

    /// Override the default classifier weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ClassifierWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Run the full pipeline over `input`.
    pub async fn classify(&self, input: &PipelineInput<'_>) -> PipelineResult {
        let start = Instant::now();

        let rule_result = self.rule_engine.classify(input.fragments, &HashMap::new());

        let behavioral_result = self.behavioral_analyzer.analyze(input.structure);

        let semantic_result = compute_semantic_result(input.current_vector, input.baseline_vector);

        let ai_result = match &self.ai_classifier {
            Some(classifier) => {
                let joined = input.fragments.join(" ");
                match classifier
                    .classify(PromptKind::GeneralAnalysis, input.url, &joined)
                    .await
                {
                    Ok(result) => Some(result),
                    Err(err) => {
                        warn!(error = %err, "AI classifier branch failed; continuing without its vote");
                        None
                    }
                }
            }
            None => None,
        };

        self.fuse(
            rule_result,
            behavioral_result,
            semantic_result,
            ai_result,
            input.historical_accuracy,
            start.elapsed().as_millis() as u64,
        )
    }

    fn fuse(
        &self,
        rule_result: RuleBasedResult,
        behavioral_result: BehavioralResult,
        semantic_result: Option<SemanticResult>,
        ai_result: Option<ClassificationResult>,
        historical_accuracy: f64,
        processing_time_ms: u64,
    ) -> PipelineResult {
        let distinct_rule_categories = rule_result
            .indicators
            .iter()
            .map(|i| i.category)
            .collect::<std::collections::HashSet<_>>()
            .len();

        let confidence_inputs = ConfidenceInputs {
            rule_confidence: Some(rule_result.confidence),
            distinct_rule_categories,
            semantic_main_content_similarity: semantic_result.as_ref().map(|s| s.main_content_similarity),
            behavioral_score: Some(behavioral_result.behavioral_score),
            ai_confidence: ai_result.as_ref().map(|a| a.confidence),
            historical_accuracy,
            ai_label: ai_result.as_ref().map(|a| a.label),
            rule_label: Some(rule_result.label),
            category: rule_result.primary_category,
        };

        let confidence_outcome = calculate_confidence(&confidence_inputs);

        let (final_label, consensus) = self.weighted_vote(&rule_result, &behavioral_result, semantic_result.as_ref(), ai_result.as_ref());

        let severity_score = calculate_severity_score(
            rule_result.primary_category,
            confidence_outcome.score,
            &rule_result.indicators,
        );

        let recommended_actions = recommend_actions(final_label, confidence_outcome.level, &rule_result);

        PipelineResult {
            final_label,
            confidence_score: confidence_outcome.score,
            confidence_level: confidence_outcome.level,
            primary_threat_category: rule_result.primary_category,
            indicators: rule_result.indicators.clone(),
            ai_result,
            rule_result: Some(rule_result),
            behavioral_result: Some(behavioral_result),
            semantic_result,
            classifier_weights: self.weights,
            confidence_factors: confidence_outcome.factors,
            consensus,
            processing_time_ms,
            recommended_actions,
            severity_score,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Weighted arg-max vote across the sub-classifiers that produced a
    /// label, with a deterministic tie-break (Defacement > Unclear >
    /// Benign) when two labels tie on vote mass. `pattern_match`'s
    /// weight is reserved and never contributes a vote.
    fn weighted_vote(
        &self,
        rule_result: &RuleBasedResult,
        behavioral_result: &BehavioralResult,
        semantic_result: Option<&SemanticResult>,
        ai_result: Option<&ClassificationResult>,
    ) -> (Classification, ConsensusMetrics) {
        let mut tallies: HashMap<Classification, f64> = HashMap::new();
        let mut signals_present = 0u8;

        let mut rule_vote = self.weights.rule * rule_result.confidence;
        if rule_result.confidence > 0.8 {
            rule_vote *= 1.5;
        }
        *tallies.entry(rule_result.label).or_insert(0.0) += rule_vote;
        signals_present += 1;

        let behavioral_vote = self.weights.behavioral;
        match behavioral_result.risk_level {
            RiskLevel::Critical | RiskLevel::High => {
                *tallies.entry(Classification::Defacement).or_insert(0.0) += behavioral_vote * 0.8;
            }
            RiskLevel::Low | RiskLevel::Minimal => {
                *tallies.entry(Classification::Benign).or_insert(0.0) += behavioral_vote * 0.8;
            }
            RiskLevel::Medium => {
                *tallies.entry(Classification::Unclear).or_insert(0.0) += behavioral_vote * 0.6;
            }
        }
        signals_present += 1;

        if let Some(semantic) = semantic_result {
            let semantic_vote = self.weights.semantic;
            match semantic.risk_level {
                RiskLevel::Critical | RiskLevel::High => {
                    *tallies.entry(Classification::Defacement).or_insert(0.0) += semantic_vote * 0.9;
                }
                RiskLevel::Low | RiskLevel::Minimal => {
                    *tallies.entry(Classification::Benign).or_insert(0.0) += semantic_vote * 0.9;
                }
                RiskLevel::Medium => {
                    *tallies.entry(Classification::Unclear).or_insert(0.0) += semantic_vote * 0.7;
                }
            }
            signals_present += 1;
        }

        if let Some(ai) = ai_result {
            *tallies.entry(ai.label).or_insert(0.0) += self.weights.ai * ai.confidence;
            signals_present += 1;
        }

        let total_vote_mass: f64 = tallies.values().sum();

        let winner = tallies
            .iter()
            .max_by(|a, b| {
                a.1.partial_cmp(b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.tie_break_rank().cmp(&b.0.tie_break_rank()))
            })
            .map(|(label, _)| *label)
            .unwrap_or(Classification::Benign);

        let winning_vote_total = tallies.get(&winner).copied().unwrap_or(0.0);

        (
            winner,
            ConsensusMetrics {
                winning_vote_total,
                total_vote_mass,
                signals_present,
            },
        )
    }
}

fn compute_semantic_result(current: Option<&[f32]>, baseline: Option<&[f32]>) -> Option<SemanticResult> {
    let (current, baseline) = (current?, baseline?);
    let similarity = cosine_similarity(current, baseline);
    let drift = (1.0 - similarity).clamp(0.0, 1.0);
    Some(SemanticResult {
        main_content_similarity: similarity,
        risk_level: RiskLevel::from_score(drift),
    })
}

/// Base-rate severity per threat category, independent of the
/// confidence model's own category multiplier.
fn base_severity(category: ThreatCategory) -> f64 {
    match category {
        ThreatCategory::Defacement => 0.8,
        ThreatCategory::Backdoor => 1.0,
        ThreatCategory::Cryptojacking => 0.7,
        ThreatCategory::SqlInjection => 0.9,
        ThreatCategory::Xss => 0.6,
        ThreatCategory::Phishing => 0.8,
        ThreatCategory::Malware => 0.9,
        ThreatCategory::Unknown => 0.5,
    }
}

fn calculate_severity_score(
    category: ThreatCategory,
    confidence: f64,
    indicators: &[ThreatIndicator],
) -> f64 {
    let mut severity = base_severity(category);

    let high_confidence_indicators = indicators.iter().filter(|i| i.confidence > 0.8).count();
    if high_confidence_indicators >= 4 {
        severity = (severity * 1.2).min(1.0);
    }

    severity *= confidence;
    severity.min(1.0)
}

fn base_actions(label: Classification) -> &'static [&'static str] {
    match label {
        Classification::Defacement => &[
            "immediately_block_traffic",
            "trigger_backup_restore",
            "notify_security_team",
            "create_incident_ticket",
            "preserve_forensic_evidence",
        ],
        Classification::Unclear => &[
            "flag_for_manual_review",
            "increase_monitoring_frequency",
            "collect_additional_evidence",
        ],
        Classification::Benign => &["update_baseline", "log_normal_activity"],
    }
}

fn category_actions(category: ThreatCategory) -> &'static [&'static str] {
    match category {
        ThreatCategory::Backdoor => &["full_system_scan", "access_log_analysis"],
        ThreatCategory::Cryptojacking => &["block_mining_pools", "cpu_monitoring"],
        ThreatCategory::Phishing => &["domain_takedown_request", "user_warning"],
        ThreatCategory::SqlInjection => &["database_audit", "query_log_review"],
        _ => &[],
    }
}

fn recommend_actions(label: Classification, level: ConfidenceLevel, rule_result: &RuleBasedResult) -> Vec<String> {
    let mut actions: Vec<String> = base_actions(label).iter().map(|s| s.to_string()).collect();

    if matches!(level, ConfidenceLevel::VeryHigh | ConfidenceLevel::Critical) {
        actions.push("escalate_to_senior_analyst".to_string());
        actions.push("initiate_emergency_response".to_string());
    }

    actions.extend(
        category_actions(rule_result.primary_category)
            .iter()
            .map(|s| s.to_string()),
    );

    let mut seen = std::collections::HashSet::new();
    actions.retain(|a| seen.insert(a.clone()));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(similarity: f64) -> StructureSummary {
        StructureSummary {
            element_count: 100,
            baseline_element_count: Some(100),
            content_similarity: similarity,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn classic_deface_banner_wins_the_vote_without_ai() {
        let pipeline = ClassificationPipeline::new(None);
        let fragments = vec!["Hacked by AnonOps - rooted your server".to_string()];
        let input = PipelineInput {
            url: "http://example.test",
            fragments: &fragments,
            structure: &structure(0.1),
            current_vector: None,
            baseline_vector: None,
            historical_accuracy: 0.7,
        };
        let result = pipeline.classify(&input).await;
        assert_eq!(result.final_label, Classification::Defacement);
        assert!(result.consensus.signals_present >= 2);
    }

    #[tokio::test]
    async fn benign_content_stays_benign() {
        let pipeline = ClassificationPipeline::new(None);
        let fragments = vec!["Welcome to our site. Copyright 2024. Privacy policy applies.".to_string()];
        let input = PipelineInput {
            url: "http://example.test",
            fragments: &fragments,
            structure: &structure(0.95),
            current_vector: None,
            baseline_vector: None,
            historical_accuracy: 0.7,
        };
        let result = pipeline.classify(&input).await;
        assert_eq!(result.final_label, Classification::Benign);
    }

    #[tokio::test]
    async fn recommended_actions_are_deduplicated() {
        let pipeline = ClassificationPipeline::new(None);
        let fragments = vec!["coinhive.min.js new CoinHive.Anonymous('x') eval(base64_decode(".to_string()];
        let input = PipelineInput {
            url: "http://example.test",
            fragments: &fragments,
            structure: &structure(0.9),
            current_vector: None,
            baseline_vector: None,
            historical_accuracy: 0.7,
        };
        let result = pipeline.classify(&input).await;
        let mut sorted = result.recommended_actions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), result.recommended_actions.len());
    }

    #[tokio::test]
    async fn cryptojacking_injection_recommends_blocking_mining_pools() {
        let pipeline = ClassificationPipeline::new(None);
        let fragments = vec![
            "<script src='coinhive.min.js'></script>".to_string(),
            "new CoinHive.Anonymous('KEY')".to_string(),
        ];
        let input = PipelineInput {
            url: "http://example.test",
            fragments: &fragments,
            structure: &structure(0.9),
            current_vector: None,
            baseline_vector: None,
            historical_accuracy: 0.7,
        };
        let result = pipeline.classify(&input).await;
        assert_eq!(result.primary_threat_category, ThreatCategory::Cryptojacking);
        assert!(result.recommended_actions.contains(&"block_mining_pools".to_string()));
    }

    #[test]
    fn semantic_result_is_none_without_both_vectors() {
        assert!(compute_semantic_result(None, None).is_none());
        assert!(compute_semantic_result(Some(&[1.0]), None).is_none());
    }
}

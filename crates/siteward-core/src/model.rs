//! Core data model: websites, snapshots, vectors, indicators, and the
//! results that flow through the classification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A monitored website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    /// Stable identity, independent of URL changes.
    pub id: Uuid,
    /// Canonical URL under monitoring.
    pub url: String,
    /// Human-facing display name.
    pub name: String,
    /// Whether the site is actively scheduled for checks.
    pub active: bool,
    /// Seconds between scheduled checks.
    pub check_interval_secs: u64,
    /// When the site was registered.
    pub created_at: DateTime<Utc>,
    /// Last time a scrape completed for this site, if any.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Website {
    /// Construct a new active website with the given check interval.
    #[must_use]
    pub fn new(url: impl Into<String>, name: impl Into<String>, check_interval_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            name: name.into(),
            active: true,
            check_interval_secs,
            created_at: Utc::now(),
            last_checked_at: None,
        }
    }
}

/// A single content capture for a website.
///
/// Immutable after classification annotates `is_defaced`/`confidence`
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identity.
    pub id: Uuid,
    /// Owning website.
    pub website_id: Uuid,
    /// Hash of `raw_bytes` (content-addressed dedup key).
    pub content_hash: String,
    /// Extracted textual content.
    pub text_content: String,
    /// Raw captured bytes.
    pub raw_bytes: Vec<u8>,
    /// HTTP status of the capture.
    pub http_status: u16,
    /// Response time of the capture, in milliseconds.
    pub response_time_ms: u64,
    /// `Content-Length` as reported (may disagree with `raw_bytes.len()`).
    pub content_length: u64,
    /// `Content-Type` as reported.
    pub content_type: String,
    /// Opaque reference into the vector store, once embedded.
    pub vector_ref: Option<String>,
    /// Set at most once by the classification job that first scores
    /// this snapshot. `None` until then.
    pub is_defaced: Option<bool>,
    /// Confidence paired with `is_defaced`.
    pub confidence: Option<f64>,
    /// When the capture happened.
    pub captured_at: DateTime<Utc>,
    /// When classification annotated this snapshot, if it has been.
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Idempotently apply a verdict. A snapshot's verdict is set at
    /// most once; later calls for the same snapshot are no-ops that
    /// return `false`.
    pub fn apply_verdict(&mut self, is_defaced: bool, confidence: f64, at: DateTime<Utc>) -> bool {
        if self.is_defaced.is_some() {
            return false;
        }
        self.is_defaced = Some(is_defaced);
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self.analyzed_at = Some(at);
        true
    }
}

/// Tag for which slice of a page a `ContentVector` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorContentType {
    /// The main body content.
    MainContent,
    /// The page `<title>`.
    Title,
    /// Individual text blocks/paragraphs.
    TextBlocks,
    /// Meta description tag content.
    MetaDescription,
    /// A combined/averaged representation.
    Combined,
}

/// A numeric embedding of a piece of page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVector {
    /// The embedding itself.
    pub values: Vec<f32>,
    /// Declared dimensionality (must equal `values.len()`).
    pub dimension: usize,
    /// Which part of the page this vector represents.
    pub content_type: VectorContentType,
    /// Hash of the source content, for cache/dedup keys.
    pub content_hash: String,
    /// Identifier of the embedding model that produced this vector.
    pub model_id: String,
    /// Original text length before chunking.
    pub original_length: usize,
    /// Number of chunks averaged into this vector.
    pub chunk_count: usize,
}

impl ContentVector {
    /// A zero vector at the given dimension, used for empty input.
    #[must_use]
    pub fn zero(dimension: usize, content_type: VectorContentType, model_id: impl Into<String>) -> Self {
        Self {
            values: vec![0.0; dimension],
            dimension,
            content_type,
            content_hash: String::new(),
            model_id: model_id.into(),
            original_length: 0,
            chunk_count: 0,
        }
    }
}

/// Threat category attributed to a matched pattern or final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// Page content replaced with a defacement banner/claim.
    Defacement,
    /// Cryptocurrency mining script injection.
    Cryptojacking,
    /// SQL injection indicators.
    SqlInjection,
    /// Cross-site scripting indicators.
    Xss,
    /// Web shell / backdoor indicators.
    Backdoor,
    /// Phishing / credential harvesting indicators.
    Phishing,
    /// Generic malware indicators (hidden iframes, obfuscated JS).
    Malware,
    /// No category could be attributed.
    Unknown,
}

impl ThreatCategory {
    /// All categories that patterns can be attributed to (excludes
    /// `Unknown`, which is a fallback, not a pattern category).
    pub const PATTERN_CATEGORIES: [ThreatCategory; 7] = [
        ThreatCategory::Defacement,
        ThreatCategory::Cryptojacking,
        ThreatCategory::SqlInjection,
        ThreatCategory::Xss,
        ThreatCategory::Backdoor,
        ThreatCategory::Phishing,
        ThreatCategory::Malware,
    ];

    /// The severity-category multiplier used by the confidence model.
    #[must_use]
    pub fn severity_multiplier(self) -> f64 {
        match self {
            ThreatCategory::Defacement | ThreatCategory::Backdoor => 1.00,
            ThreatCategory::SqlInjection | ThreatCategory::Malware => 0.95,
            ThreatCategory::Cryptojacking | ThreatCategory::Phishing => 0.90,
            ThreatCategory::Xss => 0.85,
            ThreatCategory::Unknown => 0.50,
        }
    }
}

/// A single regex hit against the pattern bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIndicator {
    /// Source pattern that matched (regex text).
    pub pattern: String,
    /// Category the pattern belongs to.
    pub category: ThreatCategory,
    /// Confidence assigned to this pattern, in `[0,1]`.
    pub confidence: f64,
    /// The matched substring.
    pub matched_text: String,
    /// `matched_text` plus up to 50 characters of context on either side.
    pub context: String,
}

/// Classification labels shared across rule-based, AI, and pipeline results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// No sign of compromise.
    Benign,
    /// Confirmed or highly likely defacement.
    Defacement,
    /// Ambiguous; worth human attention.
    Unclear,
}

impl Classification {
    /// Tie-break ordering for the weighted vote: `Defacement` beats
    /// `Unclear` beats `Benign` when vote totals are equal.
    #[must_use]
    pub fn tie_break_rank(self) -> u8 {
        match self {
            Classification::Defacement => 2,
            Classification::Unclear => 1,
            Classification::Benign => 0,
        }
    }
}

/// Output of the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBasedResult {
    /// Overall label derived from the aggregate confidence.
    pub label: Classification,
    /// Aggregate confidence in `[0,1]`.
    pub confidence: f64,
    /// Names of rules (pattern sources) that triggered.
    pub triggered_rules: Vec<String>,
    /// Per-rule raw contribution (pattern source -> signed score).
    pub rule_scores: HashMap<String, f64>,
    /// All indicators collected across triggered patterns.
    pub indicators: Vec<ThreatIndicator>,
    /// Category with the highest positive aggregate score.
    pub primary_category: ThreatCategory,
    /// Human-readable explanation (band, category, top rules).
    pub reasoning: String,
}

/// Output of the AI classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The AI's label.
    pub label: Classification,
    /// The AI's confidence in `[0,1]`.
    pub confidence: f64,
    /// Short explanation surfaced to analysts.
    pub explanation: String,
    /// Full chain-of-thought-style reasoning text, if provided.
    pub reasoning: String,
    /// Tokens consumed by the call, if known.
    pub tokens_used: Option<u32>,
    /// Identifier of the model that produced this result.
    pub model_id: String,
    /// When the classification was produced.
    pub timestamp: DateTime<Utc>,
}

/// Confidence bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    /// `< 0.2`
    VeryLow,
    /// `< 0.4`
    Low,
    /// `< 0.6`
    Medium,
    /// `< 0.8`
    High,
    /// `< 0.95`
    VeryHigh,
    /// `>= 0.95`
    Critical,
}

impl ConfidenceLevel {
    /// Map a confidence score in `[0,1]` to its band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            ConfidenceLevel::VeryLow
        } else if score < 0.4 {
            ConfidenceLevel::Low
        } else if score < 0.6 {
            ConfidenceLevel::Medium
        } else if score < 0.8 {
            ConfidenceLevel::High
        } else if score < 0.95 {
            ConfidenceLevel::VeryHigh
        } else {
            ConfidenceLevel::Critical
        }
    }
}

/// Per-factor breakdown retained alongside the fused confidence score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    /// `rule.confidence`
    pub rule_match_strength: f64,
    /// `min(1, distinct_triggered_categories / 3)`
    pub pattern_coverage: f64,
    /// `1 - semantic.main_content_similarity`
    pub semantic_drift: f64,
    /// `behavioral.score`
    pub behavioral_anomaly: f64,
    /// `ai.confidence`
    pub ai_certainty: f64,
    /// Rolling baseline, starts at 0.7.
    pub historical_accuracy: f64,
    /// 1.0 if AI and rule labels agree, else 0.5.
    pub cross_validation: f64,
}

/// Consensus/agreement metrics retained alongside the weighted vote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    /// Vote total received by the winning label.
    pub winning_vote_total: f64,
    /// Sum of vote totals across all labels (denominator for agreement ratio).
    pub total_vote_mass: f64,
    /// How many of the four sub-classifiers produced a signal.
    pub signals_present: u8,
}

/// Final fused outcome of a classification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The winning label (arg-max of the weighted vote).
    pub final_label: Classification,
    /// Fused confidence score in `[0,1]`.
    pub confidence_score: f64,
    /// Band derived from `confidence_score`.
    pub confidence_level: ConfidenceLevel,
    /// Best-attributed threat category.
    pub primary_threat_category: ThreatCategory,
    /// All indicators surfaced by the rule engine.
    pub indicators: Vec<ThreatIndicator>,
    /// Raw AI sub-result, if that component produced a signal.
    pub ai_result: Option<ClassificationResult>,
    /// Raw rule sub-result, if that component produced a signal.
    pub rule_result: Option<RuleBasedResult>,
    /// Raw behavioral sub-result, if that component produced a signal.
    pub behavioral_result: Option<crate::behavioral::BehavioralResult>,
    /// Raw semantic (vectorizer-derived) sub-result, if produced.
    pub semantic_result: Option<SemanticResult>,
    /// Classifier weights actually used for this invocation.
    pub classifier_weights: ClassifierWeights,
    /// Breakdown of the confidence model's inputs.
    pub confidence_factors: ConfidenceFactors,
    /// Vote/agreement metrics.
    pub consensus: ConsensusMetrics,
    /// Wall-clock time spent in the pipeline, in milliseconds.
    pub processing_time_ms: u64,
    /// De-duplicated, order-preserving recommended actions.
    pub recommended_actions: Vec<String>,
    /// Severity score in `[0,1]`.
    pub severity_score: f64,
    /// When the pipeline produced this result.
    pub timestamp: DateTime<Utc>,
}

/// Semantic/vector-similarity signal fed into the pipeline and confidence model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticResult {
    /// Cosine similarity between the current and prior main-content vectors.
    pub main_content_similarity: f64,
    /// Coarse risk banding derived from similarity.
    pub risk_level: RiskLevel,
}

/// Coarse risk banding shared by the behavioral analyzer and semantic signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// `< 0.2`
    Minimal,
    /// `< 0.4`
    Low,
    /// `< 0.6`
    Medium,
    /// `< 0.8`
    High,
    /// `>= 0.8`
    Critical,
}

impl RiskLevel {
    /// Map a score in `[0,1]` to a risk band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else if score >= 0.2 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }
}

/// Classifier weights used in the weighted vote (C6 step 3). The
/// `pattern_match` slot is reserved but, per the specified (and
/// preserved) behavior, never consulted in the vote itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierWeights {
    /// Weight applied to the AI sub-classifier's vote.
    pub ai: f64,
    /// Weight applied to the rule engine's vote.
    pub rule: f64,
    /// Weight applied to the semantic/vector signal's vote.
    pub semantic: f64,
    /// Weight applied to the behavioral analyzer's vote.
    pub behavioral: f64,
    /// Reserved weight for a future pattern-match voter; unused.
    pub pattern_match: f64,
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            ai: 0.20,
            rule: 0.30,
            semantic: 0.20,
            behavioral: 0.15,
            pattern_match: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_level_bands_match_spec_table() {
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::VeryLow);
        assert_eq!(ConfidenceLevel::from_score(0.19), ConfidenceLevel::VeryLow);
        assert_eq!(ConfidenceLevel::from_score(0.2), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.39), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.4), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.59), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.6), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.94), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::Critical);
        assert_eq!(ConfidenceLevel::from_score(1.0), ConfidenceLevel::Critical);
    }

    #[test]
    fn snapshot_verdict_is_set_at_most_once() {
        let mut snap = Snapshot {
            id: Uuid::new_v4(),
            website_id: Uuid::new_v4(),
            content_hash: "abc".into(),
            text_content: String::new(),
            raw_bytes: vec![],
            http_status: 200,
            response_time_ms: 10,
            content_length: 0,
            content_type: "text/html".into(),
            vector_ref: None,
            is_defaced: None,
            confidence: None,
            captured_at: Utc::now(),
            analyzed_at: None,
        };
        assert!(snap.apply_verdict(true, 0.9, Utc::now()));
        assert_eq!(snap.is_defaced, Some(true));
        // Second classification for the same snapshot is idempotent.
        assert!(!snap.apply_verdict(false, 0.1, Utc::now()));
        assert_eq!(snap.is_defaced, Some(true));
        assert_eq!(snap.confidence, Some(0.9));
    }

    #[test]
    fn tie_break_prefers_defacement_over_unclear_over_benign() {
        assert!(Classification::Defacement.tie_break_rank() > Classification::Unclear.tie_break_rank());
        assert!(Classification::Unclear.tie_break_rank() > Classification::Benign.tie_break_rank());
    }
}

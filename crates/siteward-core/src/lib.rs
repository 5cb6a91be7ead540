//! # siteward-core
//!
//! Detection core for website defacement monitoring: a regex rule
//! engine, a DOM/resource behavioral analyzer, a content vectorizer
//! for semantic drift, an optional LLM-backed classifier, and a fusion
//! pipeline that combines all four into one scored verdict.
//!
//! ## Modules
//!
//! - [`model`] — shared data types (`Website`, `Snapshot`, `ContentVector`,
//!   `PipelineResult`, ...)
//! - [`patterns`] — the compiled threat/benign pattern bank
//! - [`rule_engine`] — pattern matching over page content
//! - [`behavioral`] — DOM/resource anomaly scoring
//! - [`vectorizer`] — chunking, embedding, and similarity
//! - [`ai_classifier`] — LLM-as-judge classification
//! - [`confidence`] — weighted signal fusion
//! - [`pipeline`] — ties the above into one end-to-end pass
//! - [`config`] — tunables for the pipeline and its sub-components
//! - [`clock`] — injected time source for deterministic tests

#![warn(missing_docs)]

pub mod ai_classifier;
pub mod behavioral;
pub mod clock;
pub mod config;
pub mod confidence;
pub mod error;
pub mod model;
pub mod patterns;
pub mod pipeline;
pub mod rule_engine;
pub mod vectorizer;

pub use ai_classifier::{AiClassifier, ChatBackend, PromptKind};
pub use behavioral::{BehavioralAnalyzer, BehavioralResult, StructureSummary};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::DetectionConfig;
pub use confidence::{calculate_confidence, ConfidenceInputs, ConfidenceOutcome};
pub use error::{Error, Result};
pub use model::{
    Classification, ClassificationResult, ClassifierWeights, ConfidenceFactors, ConfidenceLevel,
    ConsensusMetrics, ContentVector, PipelineResult, RiskLevel, RuleBasedResult, SemanticResult,
    Snapshot, ThreatCategory, ThreatIndicator, VectorContentType, Website,
};
pub use pipeline::{ClassificationPipeline, PipelineInput};
pub use rule_engine::RuleEngine;
pub use vectorizer::{cosine_similarity, find_similar, similarity_by_method, ContentVectorizer, SimilarityMethod};

//! Core detection configuration.
//!
//! A plain `Default`-plus-builder config struct: one struct per
//! concern, sensible defaults, `with_*` setters for callers that want
//! to override a handful of fields without naming all of them.

use crate::model::ClassifierWeights;
use std::time::Duration;

/// Configuration for the classification pipeline and its sub-components.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Weights used in the pipeline's weighted vote.
    pub classifier_weights: ClassifierWeights,
    /// Maximum content length sent to the AI classifier.
    pub ai_max_content_chars: usize,
    /// Maximum concurrent in-flight AI classifier calls.
    pub ai_max_concurrency: usize,
    /// Minimum spacing between AI classifier calls.
    pub ai_min_call_interval: Duration,
    /// Embedding dimensionality used by the configured vectorizer.
    pub vector_dimension: usize,
    /// Rolling historical-accuracy baseline fed into the confidence
    /// model before any feedback has been recorded.
    pub initial_historical_accuracy: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            classifier_weights: ClassifierWeights::default(),
            ai_max_content_chars: crate::ai_classifier::MAX_CONTENT_CHARS,
            ai_max_concurrency: crate::ai_classifier::DEFAULT_MAX_CONCURRENCY,
            ai_min_call_interval: crate::ai_classifier::MIN_CALL_INTERVAL,
            vector_dimension: 1536,
            initial_historical_accuracy: crate::confidence::DEFAULT_HISTORICAL_ACCURACY,
        }
    }
}

impl DetectionConfig {
    /// Override the classifier weights used in the weighted vote.
    #[must_use]
    pub fn with_classifier_weights(mut self, weights: ClassifierWeights) -> Self {
        self.classifier_weights = weights;
        self
    }

    /// Override the embedding dimensionality.
    #[must_use]
    pub fn with_vector_dimension(mut self, dimension: usize) -> Self {
        self.vector_dimension = dimension;
        self
    }

    /// Override the AI classifier's concurrency cap.
    #[must_use]
    pub fn with_ai_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.ai_max_concurrency = max_concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.vector_dimension, 1536);
        assert!((config.initial_historical_accuracy - 0.7).abs() < 1e-9);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = DetectionConfig::default().with_vector_dimension(768).with_ai_max_concurrency(2);
        assert_eq!(config.vector_dimension, 768);
        assert_eq!(config.ai_max_concurrency, 2);
    }
}

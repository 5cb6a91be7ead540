//! DOM/resource anomaly scoring.
//!
//! A fixed table of `(metric, weight)` plus pure detector functions,
//! specialized to six DOM/resource anomalies.

use crate::model::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Suspicious TLDs/hosts.
const SUSPICIOUS_HOSTS: [&str; 5] = [".tk", ".ml", ".ga", ".cf", "bit.ly"];
const SUSPICIOUS_HOST_EXTRA: &str = "tinyurl.com";

/// Names and fixed weights of the six tracked anomalies.
const ANOMALY_WEIGHTS: &[(&str, f64)] = &[
    ("sudden_content_replacement", 0.80),
    ("mass_element_deletion", 0.70),
    ("suspicious_script_injection", 0.85),
    ("unusual_external_resources", 0.60),
    ("abnormal_update_frequency", 0.50),
    ("performance_degradation", 0.40),
];

/// Summary of the current page's DOM/structure, relative to a baseline.
#[derive(Debug, Clone, Default)]
pub struct StructureSummary {
    /// Number of DOM elements in the current capture.
    pub element_count: usize,
    /// Number of DOM elements in the historical baseline, if known.
    pub baseline_element_count: Option<usize>,
    /// Cosine-style similarity between current and baseline content, `[0,1]`.
    pub content_similarity: f64,
    /// Whether a script-injection pattern was already flagged upstream
    /// (the rule engine owns actual script detection; this flag lets
    /// the behavioral analyzer factor it into anomaly presence without
    /// re-implementing pattern matching).
    pub script_injection_flagged: bool,
    /// Update frequency anomaly flag (computed upstream from capture history).
    pub abnormal_update_frequency: bool,
    /// Whether response time regressed significantly versus baseline.
    pub performance_degraded: bool,
    /// External resource URLs referenced by the current capture.
    pub external_resources: Vec<String>,
}

/// Output of the behavioral analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralResult {
    /// Presence map for each of the six tracked anomalies.
    pub anomalies: HashMap<String, bool>,
    /// Weighted, clamped behavioral score in `[0,1]`.
    pub behavioral_score: f64,
    /// Risk band derived from `behavioral_score`.
    pub risk_level: RiskLevel,
}

/// Stateless behavioral analyzer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BehavioralAnalyzer;

impl BehavioralAnalyzer {
    /// Score the current structure summary against its baseline.
    #[must_use]
    pub fn analyze(&self, current: &StructureSummary) -> BehavioralResult {
        let mut anomalies = HashMap::new();

        let mass_deletion = match current.baseline_element_count {
            Some(old) if old > 0 => {
                let ratio = 1.0 - (current.element_count as f64 / old as f64);
                ratio > 0.5
            }
            _ => false,
        };
        anomalies.insert("mass_element_deletion".to_string(), mass_deletion);

        let sudden_replacement = current.content_similarity < 0.3;
        anomalies.insert("sudden_content_replacement".to_string(), sudden_replacement);

        let unusual_resources = current
            .external_resources
            .iter()
            .filter(|url| is_suspicious_host(url))
            .count()
            > 2;
        anomalies.insert("unusual_external_resources".to_string(), unusual_resources);

        anomalies.insert(
            "suspicious_script_injection".to_string(),
            current.script_injection_flagged,
        );
        anomalies.insert(
            "abnormal_update_frequency".to_string(),
            current.abnormal_update_frequency,
        );
        anomalies.insert(
            "performance_degradation".to_string(),
            current.performance_degraded,
        );

        let mut score = 0.0;
        for (name, weight) in ANOMALY_WEIGHTS {
            if *anomalies.get(*name).unwrap_or(&false) {
                score += weight;
            }
        }
        let behavioral_score = score.clamp(0.0, 1.0);

        BehavioralResult {
            anomalies,
            behavioral_score,
            risk_level: RiskLevel::from_score(behavioral_score),
        }
    }
}

fn is_suspicious_host(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    SUSPICIOUS_HOSTS.iter().any(|h| lower.contains(h)) || lower.contains(SUSPICIOUS_HOST_EXTRA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_anomalies_yields_minimal_risk() {
        let summary = StructureSummary {
            element_count: 100,
            baseline_element_count: Some(100),
            content_similarity: 0.95,
            ..Default::default()
        };
        let result = BehavioralAnalyzer.analyze(&summary);
        assert_eq!(result.behavioral_score, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Minimal);
    }

    #[test]
    fn mass_element_deletion_triggers_on_over_half_loss() {
        let summary = StructureSummary {
            element_count: 40,
            baseline_element_count: Some(100),
            content_similarity: 0.9,
            ..Default::default()
        };
        let result = BehavioralAnalyzer.analyze(&summary);
        assert_eq!(result.anomalies["mass_element_deletion"], true);
        assert!((result.behavioral_score - 0.70).abs() < 1e-9);
    }

    #[test]
    fn sudden_replacement_and_script_injection_reach_critical() {
        let summary = StructureSummary {
            element_count: 100,
            baseline_element_count: Some(100),
            content_similarity: 0.1,
            script_injection_flagged: true,
            ..Default::default()
        };
        let result = BehavioralAnalyzer.analyze(&summary);
        // 0.80 (replacement) + 0.85 (script injection), clamped.
        assert_eq!(result.behavioral_score, 1.0);
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn unusual_external_resources_requires_more_than_two() {
        let summary = StructureSummary {
            element_count: 100,
            baseline_element_count: Some(100),
            content_similarity: 0.95,
            external_resources: vec![
                "http://evil.tk/a.js".into(),
                "http://evil.ml/b.js".into(),
            ],
            ..Default::default()
        };
        let result = BehavioralAnalyzer.analyze(&summary);
        assert_eq!(result.anomalies["unusual_external_resources"], false);

        let summary3 = StructureSummary {
            external_resources: vec![
                "http://evil.tk/a.js".into(),
                "http://evil.ml/b.js".into(),
                "http://evil.ga/c.js".into(),
            ],
            ..summary
        };
        let result3 = BehavioralAnalyzer.analyze(&summary3);
        assert_eq!(result3.anomalies["unusual_external_resources"], true);
    }
}

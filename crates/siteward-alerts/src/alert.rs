//! Alert Generator: gate, severity matrix, escalation, and
//! suppression over a `PipelineResult`.
//!
//! A `struct { config }` with a single `generate`-shaped entry point:
//! one pipeline result in, `Option<Alert>` out, plus an internal
//! suppression table.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteward_core::{Classification, Clock, ConfidenceLevel, PipelineResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Severity assigned to a generated alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Lowest severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Highest severity; paged immediately.
    Critical,
}

impl AlertSeverity {
    fn default_suppression_window(self) -> chrono::Duration {
        match self {
            AlertSeverity::Critical => chrono::Duration::minutes(5),
            AlertSeverity::High => chrono::Duration::minutes(15),
            AlertSeverity::Medium => chrono::Duration::minutes(30),
            AlertSeverity::Low => chrono::Duration::hours(2),
        }
    }
}

/// Category of alert, driving template selection downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Confirmed or high-confidence defacement.
    DefacementDetected,
    /// Defacement-labeled but not severe enough to page immediately.
    SuspiciousActivity,
    /// Unclear label with high model confidence in the ambiguity.
    ContentAnomaly,
    /// Unclear label without strong confidence either way.
    ClassificationUncertainty,
}

/// Named escalation factors that can bump severity beyond the base
/// (label, confidence level) matrix lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationFactors {
    /// More than one distinct anomaly/indicator fired together.
    pub multiple_changes: bool,
    /// A visual/branding change was detected.
    pub visual_changes: bool,
    /// Suspicious patterns beyond the primary trigger were present.
    pub suspicious_patterns: bool,
    /// This site has a history of anomalies.
    pub historical_anomaly: bool,
    /// Changes are occurring faster than the site's normal cadence.
    pub rapid_changes: bool,
    /// Newly observed external links/resources.
    pub external_links: bool,
    /// A script-injection indicator fired.
    pub script_injection: bool,
    /// Wholesale content replacement was detected.
    pub content_replacement: bool,
}

impl EscalationFactors {
    fn score(self) -> f64 {
        let mut score = 0.0;
        if self.multiple_changes {
            score += 0.5;
        }
        if self.visual_changes {
            score += 0.3;
        }
        if self.suspicious_patterns {
            score += 0.4;
        }
        if self.historical_anomaly {
            score += 0.3;
        }
        if self.rapid_changes {
            score += 0.6;
        }
        if self.external_links {
            score += 0.2;
        }
        if self.script_injection {
            score += 0.8;
        }
        if self.content_replacement {
            score += 0.6;
        }
        score
    }
}

/// Caller-supplied context that augments what the pipeline result
/// alone can tell the generator (escalation factors, whether visual
/// diffing flagged a significant change, the owning website id).
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    /// Website the snapshot belongs to.
    pub website_id: String,
    /// Whether an upstream visual diff flagged a significant change.
    pub visual_significant_change: bool,
    /// Escalation factors observed alongside this classification.
    pub escalation_factors: EscalationFactors,
}

/// A generated alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Opaque id, minted without a store round-trip.
    pub alert_id: String,
    /// Website this alert concerns.
    pub website_id: String,
    /// Category driving template selection.
    pub alert_type: AlertType,
    /// Final severity after escalation.
    pub severity: AlertSeverity,
    /// 1..4 routing priority derived from severity.
    pub escalation_level: u8,
    /// Human-readable title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Recommended next steps.
    pub recommended_actions: Vec<String>,
    /// Suppression key: `"{website_id}:{alert_type}"`.
    pub suppression_key: String,
    /// When the alert was generated.
    pub created_at: DateTime<Utc>,
}

/// Configuration for the alert generator: per-severity suppression
/// windows, overridable from the daemon's configuration surface.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Suppression window for Critical alerts.
    pub critical_window: chrono::Duration,
    /// Suppression window for High alerts.
    pub high_window: chrono::Duration,
    /// Suppression window for Medium alerts.
    pub medium_window: chrono::Duration,
    /// Suppression window for Low alerts.
    pub low_window: chrono::Duration,
}

impl AlertConfig {
    fn window_for(&self, severity: AlertSeverity) -> chrono::Duration {
        match severity {
            AlertSeverity::Critical => self.critical_window,
            AlertSeverity::High => self.high_window,
            AlertSeverity::Medium => self.medium_window,
            AlertSeverity::Low => self.low_window,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            critical_window: AlertSeverity::Critical.default_suppression_window(),
            high_window: AlertSeverity::High.default_suppression_window(),
            medium_window: AlertSeverity::Medium.default_suppression_window(),
            low_window: AlertSeverity::Low.default_suppression_window(),
        }
    }
}

/// Stateful alert generator: holds the suppression table across calls.
pub struct AlertGenerator {
    config: AlertConfig,
    clock: Arc<dyn Clock>,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AlertGenerator {
    /// Build a generator with default configuration and the system clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(AlertConfig::default(), clock)
    }

    /// Build a generator with explicit configuration.
    #[must_use]
    pub fn with_config(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate the gate, build an alert if it fires and isn't
    /// currently suppressed, and record the suppression timestamp.
    pub fn generate(&self, result: &PipelineResult, context: &AlertContext) -> Result<Option<Alert>> {
        if !self.should_alert(result, context) {
            return Ok(None);
        }

        let base_severity = base_severity(result.final_label, result.confidence_level);
        let escalated = escalate(base_severity, context.escalation_factors);
        let alert_type = select_alert_type(result.final_label, escalated);
        let suppression_key = format!("{}:{}", context.website_id, alert_type_key(alert_type));

        let now = self.clock.now();
        {
            let mut last_sent = self.last_sent.lock().expect("alert suppression lock poisoned");
            if let Some(last) = last_sent.get(&suppression_key) {
                if now - *last < self.config.window_for(escalated) {
                    tracing::debug!(key = %suppression_key, "alert suppressed within window");
                    return Ok(None);
                }
            }
            last_sent.insert(suppression_key.clone(), now);
        }

        let escalation_level = escalation_level(escalated);
        let recommended_actions = recommended_actions(alert_type, escalated, result);
        let mut title = format!("{:?} on {}", alert_type, context.website_id);
        if escalated == AlertSeverity::Critical {
            title = format!("URGENT: {title}");
        }

        Ok(Some(Alert {
            alert_id: format!("alert-{}-{}", context.website_id, now.timestamp()),
            website_id: context.website_id.clone(),
            alert_type,
            severity: escalated,
            escalation_level,
            title,
            description: result.rule_result.as_ref().map(|r| r.reasoning.clone()).unwrap_or_default(),
            recommended_actions,
            suppression_key,
            created_at: now,
        }))
    }

    fn should_alert(&self, result: &PipelineResult, context: &AlertContext) -> bool {
        result.final_label == Classification::Defacement
            || (result.final_label == Classification::Unclear
                && matches!(result.confidence_level, ConfidenceLevel::High | ConfidenceLevel::VeryHigh | ConfidenceLevel::Critical))
            || context.visual_significant_change
            || result.rule_result.as_ref().map(|r| r.confidence > 0.7).unwrap_or(false)
    }
}

fn base_severity(label: Classification, level: ConfidenceLevel) -> AlertSeverity {
    match label {
        Classification::Defacement => match level {
            ConfidenceLevel::VeryHigh | ConfidenceLevel::Critical => AlertSeverity::Critical,
            ConfidenceLevel::High => AlertSeverity::High,
            ConfidenceLevel::Medium => AlertSeverity::Medium,
            ConfidenceLevel::Low | ConfidenceLevel::VeryLow => AlertSeverity::Low,
        },
        Classification::Unclear => match level {
            ConfidenceLevel::High | ConfidenceLevel::VeryHigh | ConfidenceLevel::Critical => AlertSeverity::Medium,
            _ => AlertSeverity::Low,
        },
        Classification::Benign => AlertSeverity::Low,
    }
}

/// Map a 1..4 severity axis score (base + escalation deltas) back to a band.
fn escalate(base: AlertSeverity, factors: EscalationFactors) -> AlertSeverity {
    let base_score = match base {
        AlertSeverity::Low => 1.0,
        AlertSeverity::Medium => 2.0,
        AlertSeverity::High => 3.0,
        AlertSeverity::Critical => 4.0,
    };
    let total = base_score + factors.score();
    if total >= 3.5 {
        AlertSeverity::Critical
    } else if total >= 2.5 {
        AlertSeverity::High
    } else if total >= 1.5 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

fn select_alert_type(label: Classification, severity: AlertSeverity) -> AlertType {
    match label {
        Classification::Defacement => match severity {
            AlertSeverity::High | AlertSeverity::Critical => AlertType::DefacementDetected,
            _ => AlertType::SuspiciousActivity,
        },
        Classification::Unclear => match severity {
            AlertSeverity::High | AlertSeverity::Critical => AlertType::ContentAnomaly,
            _ => AlertType::ClassificationUncertainty,
        },
        Classification::Benign => AlertType::SuspiciousActivity,
    }
}

fn alert_type_key(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::DefacementDetected => "defacement_detected",
        AlertType::SuspiciousActivity => "suspicious_activity",
        AlertType::ContentAnomaly => "content_anomaly",
        AlertType::ClassificationUncertainty => "classification_uncertainty",
    }
}

fn escalation_level(severity: AlertSeverity) -> u8 {
    match severity {
        AlertSeverity::Low => 1,
        AlertSeverity::Medium => 2,
        AlertSeverity::High => 3,
        AlertSeverity::Critical => 4,
    }
}

fn recommended_actions(alert_type: AlertType, severity: AlertSeverity, result: &PipelineResult) -> Vec<String> {
    let mut actions = result.recommended_actions.clone();
    match alert_type {
        AlertType::DefacementDetected => {
            actions.push("notify_site_owner".to_string());
            actions.push("capture_forensic_snapshot".to_string());
        }
        AlertType::SuspiciousActivity => actions.push("flag_for_manual_review".to_string()),
        AlertType::ContentAnomaly | AlertType::ClassificationUncertainty => {
            actions.push("flag_for_manual_review".to_string());
        }
    }
    if severity == AlertSeverity::Critical {
        actions.push("page_on_call".to_string());
    }
    let mut seen = std::collections::HashSet::new();
    actions.retain(|a| seen.insert(a.clone()));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteward_core::{ClassifierWeights, ConfidenceFactors, ConsensusMetrics, FixedClock, ThreatCategory};

    fn base_result(label: Classification, confidence_score: f64, confidence_level: ConfidenceLevel) -> PipelineResult {
        PipelineResult {
            final_label: label,
            confidence_score,
            confidence_level,
            primary_threat_category: ThreatCategory::Defacement,
            indicators: vec![],
            ai_result: None,
            rule_result: None,
            behavioral_result: None,
            semantic_result: None,
            classifier_weights: ClassifierWeights::default(),
            confidence_factors: ConfidenceFactors::default(),
            consensus: ConsensusMetrics::default(),
            processing_time_ms: 0,
            recommended_actions: vec![],
            severity_score: confidence_score,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn defacement_at_critical_confidence_yields_critical_alert() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let generator = AlertGenerator::new(clock);
        let result = base_result(Classification::Defacement, 0.97, ConfidenceLevel::Critical);
        let context = AlertContext {
            website_id: "site-1".to_string(),
            ..Default::default()
        };
        let alert = generator.generate(&result, &context).unwrap().expect("should alert");
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.alert_type, AlertType::DefacementDetected);
        assert!(alert.title.starts_with("URGENT"));
    }

    #[test]
    fn benign_result_never_alerts() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let generator = AlertGenerator::new(clock);
        let result = base_result(Classification::Benign, 0.1, ConfidenceLevel::VeryLow);
        let context = AlertContext {
            website_id: "site-1".to_string(),
            ..Default::default()
        };
        assert!(generator.generate(&result, &context).unwrap().is_none());
    }

    #[test]
    fn repeat_alert_within_window_is_suppressed() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let generator = AlertGenerator::new(clock.clone());
        let result = base_result(Classification::Defacement, 0.97, ConfidenceLevel::Critical);
        let context = AlertContext {
            website_id: "site-1".to_string(),
            ..Default::default()
        };

        let first = generator.generate(&result, &context).unwrap();
        assert!(first.is_some());

        clock.advance(chrono::Duration::seconds(60));
        let second = generator.generate(&result, &context).unwrap();
        assert!(second.is_none(), "60s < 5min critical window, should suppress");

        clock.advance(chrono::Duration::minutes(6));
        let third = generator.generate(&result, &context).unwrap();
        assert!(third.is_some(), "past the window, should alert again");
    }

    #[test]
    fn escalation_factors_push_severity_up() {
        let low = escalate(AlertSeverity::Low, EscalationFactors::default());
        assert_eq!(low, AlertSeverity::Low);

        let escalated = escalate(
            AlertSeverity::Low,
            EscalationFactors {
                script_injection: true,
                rapid_changes: true,
                ..Default::default()
            },
        );
        assert_eq!(escalated, AlertSeverity::High);
    }
}

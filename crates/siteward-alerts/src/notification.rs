//! Notification Router: matches an alert against a template registry,
//! unions recipients across matching templates, throttles repeat
//! sends, and dispatches through the configured channels.
//!
//! Grounded on the same `struct { config, state }` + single dispatch
//! entry point shape as `alert::AlertGenerator`, generalized to fan
//! out over a registry instead of a single rule.

use crate::alert::{Alert, AlertType};
use crate::channels::NotificationChannel;
use crate::error::Result;
use chrono::{DateTime, Utc};
use siteward_core::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const THROTTLE_ENTRY_MAX_AGE: chrono::Duration = chrono::Duration::hours(24);

/// A routing rule: which alerts it applies to, who gets notified, and
/// through which channels.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    /// Unique id, used as part of the throttle key.
    pub id: String,
    /// Alert types this template matches. Empty means "any".
    pub alert_types: Vec<AlertType>,
    /// Minimum severity (inclusive) this template matches.
    pub min_severity: crate::alert::AlertSeverity,
    /// Routing priority; lower sorts first when multiple templates match.
    pub priority: u8,
    /// Channel names this template delivers through.
    pub channels: Vec<String>,
    /// Recipients this template notifies.
    pub recipients: Vec<String>,
    /// Minimum interval between sends for the same (template, alert key).
    pub throttle: chrono::Duration,
    /// Minutes until an escalation callback fires for this template.
    /// `0` disables escalation for this template.
    pub escalation_minutes: i64,
}

impl NotificationTemplate {
    fn matches(&self, alert: &Alert) -> bool {
        let type_matches = self.alert_types.is_empty() || self.alert_types.contains(&alert.alert_type);
        type_matches && alert.severity >= self.min_severity
    }
}

/// Default template set covering the standard defacement escalation
/// ladder plus operational and benign-change notices.
#[must_use]
pub fn default_templates() -> Vec<NotificationTemplate> {
    use crate::alert::AlertSeverity::{Critical, High, Low, Medium};
    use AlertType::{ClassificationUncertainty, ContentAnomaly, DefacementDetected, SuspiciousActivity};

    vec![
        NotificationTemplate {
            id: "critical_defacement".to_string(),
            alert_types: vec![DefacementDetected],
            min_severity: Critical,
            priority: 0,
            channels: vec!["pagerduty".to_string(), "slack".to_string()],
            recipients: vec!["oncall".to_string(), "security-team".to_string()],
            throttle: chrono::Duration::minutes(5),
            escalation_minutes: 15,
        },
        NotificationTemplate {
            id: "high_defacement".to_string(),
            alert_types: vec![DefacementDetected],
            min_severity: High,
            priority: 1,
            channels: vec!["slack".to_string()],
            recipients: vec!["security-team".to_string()],
            throttle: chrono::Duration::minutes(15),
            escalation_minutes: 30,
        },
        NotificationTemplate {
            id: "standard_defacement".to_string(),
            alert_types: vec![DefacementDetected, SuspiciousActivity],
            min_severity: Low,
            priority: 2,
            channels: vec!["email".to_string()],
            recipients: vec!["site-owner".to_string()],
            throttle: chrono::Duration::minutes(30),
            escalation_minutes: 0,
        },
        NotificationTemplate {
            id: "site_down_critical".to_string(),
            alert_types: vec![SuspiciousActivity],
            min_severity: Critical,
            priority: 0,
            channels: vec!["pagerduty".to_string()],
            recipients: vec!["oncall".to_string()],
            throttle: chrono::Duration::minutes(5),
            escalation_minutes: 20,
        },
        NotificationTemplate {
            id: "system_error".to_string(),
            alert_types: vec![],
            min_severity: Critical,
            priority: 0,
            channels: vec!["pagerduty".to_string()],
            recipients: vec!["oncall".to_string()],
            throttle: chrono::Duration::minutes(5),
            escalation_minutes: 0,
        },
        NotificationTemplate {
            id: "benign_change".to_string(),
            alert_types: vec![ContentAnomaly, ClassificationUncertainty],
            min_severity: Medium,
            priority: 3,
            channels: vec!["email".to_string()],
            recipients: vec!["site-owner".to_string()],
            throttle: chrono::Duration::hours(2),
            escalation_minutes: 0,
        },
    ]
}

struct ScheduledEscalation {
    #[allow(dead_code)]
    template_id: String,
    #[allow(dead_code)]
    alert_id: String,
    at: DateTime<Utc>,
}

/// Routes generated alerts to notification channels per the template
/// registry.
pub struct NotificationRouter {
    templates: Vec<NotificationTemplate>,
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    clock: Arc<dyn Clock>,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
    escalations: Mutex<Vec<ScheduledEscalation>>,
}

impl NotificationRouter {
    /// Build a router with the default template set.
    #[must_use]
    pub fn new(channels: HashMap<String, Arc<dyn NotificationChannel>>, clock: Arc<dyn Clock>) -> Self {
        Self::with_templates(default_templates(), channels, clock)
    }

    /// Build a router with an explicit template set.
    #[must_use]
    pub fn with_templates(
        templates: Vec<NotificationTemplate>,
        channels: HashMap<String, Arc<dyn NotificationChannel>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            templates,
            channels,
            clock,
            last_sent: Mutex::new(HashMap::new()),
            escalations: Mutex::new(Vec::new()),
        }
    }

    /// Route `alert`: select matching templates, union their channels
    /// and recipients, check each matching template's throttle, and
    /// dispatch through every channel named by a non-throttled template.
    pub async fn route(&self, alert: &Alert) -> Result<()> {
        let mut matching: Vec<&NotificationTemplate> =
            self.templates.iter().filter(|t| t.matches(alert)).collect();
        matching.sort_by_key(|t| t.priority);

        if matching.is_empty() {
            tracing::debug!(alert_id = %alert.alert_id, "no template matched alert");
            return Ok(());
        }

        let mut channel_names = std::collections::HashSet::new();
        let mut recipients = std::collections::HashSet::new();
        let now = self.clock.now();

        for template in &matching {
            let throttle_key = format!("{}:{}", template.id, alert.suppression_key);
            let throttled = {
                let last_sent = self.last_sent.lock().expect("throttle lock poisoned");
                last_sent
                    .get(&throttle_key)
                    .is_some_and(|last| now - *last < template.throttle)
            };
            if throttled {
                tracing::debug!(template = %template.id, "notification throttled");
                continue;
            }

            channel_names.extend(template.channels.iter().cloned());
            recipients.extend(template.recipients.iter().cloned());

            self.last_sent
                .lock()
                .expect("throttle lock poisoned")
                .insert(throttle_key, now);

            if template.escalation_minutes > 0 {
                self.schedule_escalation(template, alert, now);
            }
        }

        let recipients: Vec<String> = recipients.into_iter().collect();
        for name in channel_names {
            if let Some(channel) = self.channels.get(&name) {
                if let Err(e) = channel.deliver(alert, &recipients).await {
                    tracing::warn!(channel = %name, error = %e, "notification delivery failed");
                }
            } else {
                tracing::warn!(channel = %name, "no channel registered for this name");
            }
        }

        self.prune_stale_entries(now);
        Ok(())
    }

    fn schedule_escalation(&self, template: &NotificationTemplate, alert: &Alert, now: DateTime<Utc>) {
        self.escalations
            .lock()
            .expect("escalation lock poisoned")
            .push(ScheduledEscalation {
                template_id: template.id.clone(),
                alert_id: alert.alert_id.clone(),
                at: now + chrono::Duration::minutes(template.escalation_minutes),
            });
    }

    /// Number of escalation callbacks currently scheduled. Tests use
    /// this to confirm Critical alerts schedule a follow-up; nothing
    /// yet drains the queue at its `at` time.
    #[must_use]
    pub fn pending_escalations(&self) -> usize {
        self.escalations.lock().expect("escalation lock poisoned").len()
    }

    fn prune_stale_entries(&self, now: DateTime<Utc>) {
        self.last_sent
            .lock()
            .expect("throttle lock poisoned")
            .retain(|_, sent_at| now - *sent_at < THROTTLE_ENTRY_MAX_AGE);
        self.escalations
            .lock()
            .expect("escalation lock poisoned")
            .retain(|e| now - e.at < THROTTLE_ENTRY_MAX_AGE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSeverity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use siteward_core::FixedClock;

    struct CountingChannel(AtomicUsize);

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        async fn deliver(&self, _alert: &Alert, _recipients: &[String]) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn critical_alert() -> Alert {
        Alert {
            alert_id: "alert-1".to_string(),
            website_id: "site-1".to_string(),
            alert_type: AlertType::DefacementDetected,
            severity: AlertSeverity::Critical,
            escalation_level: 4,
            title: "URGENT: test".to_string(),
            description: "test".to_string(),
            recommended_actions: vec![],
            suppression_key: "site-1:defacement_detected".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn critical_defacement_dispatches_to_pagerduty_and_slack_and_schedules_escalation() {
        let pagerduty = Arc::new(CountingChannel(AtomicUsize::new(0)));
        let slack = Arc::new(CountingChannel(AtomicUsize::new(0)));
        let mut channels: HashMap<String, Arc<dyn NotificationChannel>> = HashMap::new();
        channels.insert("pagerduty".to_string(), pagerduty.clone());
        channels.insert("slack".to_string(), slack.clone());

        let clock = Arc::new(FixedClock::new(Utc::now()));
        let router = NotificationRouter::new(channels, clock);
        router.route(&critical_alert()).await.unwrap();

        assert_eq!(pagerduty.0.load(Ordering::SeqCst), 1);
        assert_eq!(slack.0.load(Ordering::SeqCst), 1);
        assert_eq!(router.pending_escalations(), 2);
    }

    #[tokio::test]
    async fn repeat_route_within_throttle_window_is_skipped() {
        let pagerduty = Arc::new(CountingChannel(AtomicUsize::new(0)));
        let mut channels: HashMap<String, Arc<dyn NotificationChannel>> = HashMap::new();
        channels.insert("pagerduty".to_string(), pagerduty.clone());
        channels.insert("slack".to_string(), Arc::new(CountingChannel(AtomicUsize::new(0))));

        let clock = Arc::new(FixedClock::new(Utc::now()));
        let router = NotificationRouter::new(channels, clock.clone());

        router.route(&critical_alert()).await.unwrap();
        clock.advance(chrono::Duration::seconds(30));
        router.route(&critical_alert()).await.unwrap();

        assert_eq!(pagerduty.0.load(Ordering::SeqCst), 1, "throttled within 5min window");
    }

    #[tokio::test]
    async fn no_matching_template_is_a_no_op() {
        let channels: HashMap<String, Arc<dyn NotificationChannel>> = HashMap::new();
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let router = NotificationRouter::with_templates(vec![], channels, clock);
        router.route(&critical_alert()).await.unwrap();
        assert_eq!(router.pending_escalations(), 0);
    }
}

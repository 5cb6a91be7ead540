//! Delivery channels for routed alerts.
//!
//! `NotificationChannel` is the external collaborator boundary the
//! router dispatches through; `WebhookChannel` is one concrete,
//! testable implementation: a small config struct holding a
//! `reqwest::Client` plus an `async fn` that posts a JSON payload and
//! maps a non-2xx response to an error. Production Slack/email/
//! PagerDuty integrations are out of scope.

use crate::alert::Alert;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A destination an alert can be delivered to.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `alert` to `recipients`.
    async fn deliver(&self, alert: &Alert, recipients: &[String]) -> Result<()>;

    /// Identifier used in logs and template channel lists.
    fn name(&self) -> &str;
}

/// Configuration for a `WebhookChannel`.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Destination URL the alert payload is POSTed to.
    pub url: String,
    /// Name surfaced in logs/templates.
    pub channel_name: String,
}

/// Posts alerts as a JSON payload to a configured webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Build a channel from `config`.
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(HTTP_REQUEST_TIMEOUT)
                .connect_timeout(HTTP_CONNECT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn deliver(&self, alert: &Alert, recipients: &[String]) -> Result<()> {
        let payload = json!({
            "alert_id": alert.alert_id,
            "website_id": alert.website_id,
            "alert_type": alert.alert_type,
            "severity": alert.severity,
            "title": alert.title,
            "description": alert.description,
            "recommended_actions": alert.recommended_actions,
            "recipients": recipients,
            "created_at": alert.created_at,
        });

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!("webhook returned {status}: {body}")));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.channel_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertType;
    use chrono::Utc;

    struct RecordingChannel {
        delivered: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn deliver(&self, alert: &Alert, _recipients: &[String]) -> Result<()> {
            self.delivered.lock().unwrap().push(alert.alert_id.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn sample_alert() -> Alert {
        Alert {
            alert_id: "alert-1".to_string(),
            website_id: "site-1".to_string(),
            alert_type: AlertType::DefacementDetected,
            severity: crate::alert::AlertSeverity::Critical,
            escalation_level: 4,
            title: "URGENT: test".to_string(),
            description: "test".to_string(),
            recommended_actions: vec![],
            suppression_key: "site-1:defacement_detected".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_channel_captures_delivered_alerts() {
        let channel = RecordingChannel {
            delivered: std::sync::Mutex::new(vec![]),
        };
        let alert = sample_alert();
        channel.deliver(&alert, &["oncall".to_string()]).await.unwrap();
        assert_eq!(channel.delivered.lock().unwrap().as_slice(), ["alert-1".to_string()]);
    }
}

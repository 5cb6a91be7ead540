//! TOML configuration surface for the orchestrator binary.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

fn default_scraping_workers() -> usize {
    2
}
fn default_queue_size() -> usize {
    500
}
fn default_ai_concurrent() -> usize {
    5
}
fn default_ai_interval_ms() -> u64 {
    200
}
fn default_ai_prompt_chars() -> usize {
    50_000
}
fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ai_max_tokens() -> u32 {
    1024
}
fn default_ai_temperature() -> f64 {
    0.2
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub max_workers: usize,
    pub max_queue_size: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_workers: default_scraping_workers(),
            max_queue_size: default_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub max_workers: usize,
    pub max_queue_size: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            max_workers: default_scraping_workers(),
            max_queue_size: default_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub max_concurrent: usize,
    pub min_interval_ms: u64,
    pub max_prompt_chars: usize,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_ai_concurrent(),
            min_interval_ms: default_ai_interval_ms(),
            max_prompt_chars: default_ai_prompt_chars(),
            model: default_ai_model(),
            max_tokens: default_ai_max_tokens(),
            temperature: default_ai_temperature(),
            api_key: None,
        }
    }
}

impl AiConfig {
    /// The configured minimum interval as a [`Duration`].
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertThrottleConfig {
    pub critical_minutes: i64,
    pub high_minutes: i64,
    pub medium_minutes: i64,
    pub low_minutes: i64,
}

impl Default for AlertThrottleConfig {
    fn default() -> Self {
        Self {
            critical_minutes: 5,
            high_minutes: 15,
            medium_minutes: 30,
            low_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineWeightsConfig {
    pub ai: f64,
    pub rule: f64,
    pub semantic: f64,
    pub behavioral: f64,
    pub pattern: f64,
}

impl Default for PipelineWeightsConfig {
    fn default() -> Self {
        Self {
            ai: 0.20,
            rule: 0.30,
            semantic: 0.20,
            behavioral: 0.15,
            pattern: 0.15,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_channels: Vec<String>,
    pub default_users: Vec<String>,
}

fn default_check_interval_secs() -> u64 {
    15 * 60
}

/// One site under active monitoring: its scrape target and how often
/// the scheduling orchestrator should re-scrape it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteConfig {
    /// Stable identifier, also used as the `website_id` on jobs and
    /// alerts raised for this site.
    pub id: uuid::Uuid,
    /// URL the scraper fetches.
    pub url: String,
    /// How often to re-check this site.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_seconds: u64,
}

/// Top-level daemon configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Scraping worker pool settings.
    pub scraping: ScrapingConfig,
    /// Classification worker pool settings.
    pub classification: ClassificationConfig,
    /// AI classifier rate-limiting and model settings.
    pub ai: AiConfig,
    /// Per-severity alert suppression windows.
    pub alert_throttle: AlertThrottleConfig,
    /// Sub-classifier fusion weights.
    pub pipeline_weights: PipelineWeightsConfig,
    /// Default notification fan-out.
    pub notification: NotificationConfig,
    /// Sites the scheduling orchestrator keeps under active monitoring.
    pub websites: Vec<WebsiteConfig>,
}

impl DaemonConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Startup(format!("could not read config file {}: {e}", path.display())))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::Startup(format!("invalid config file {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants the type system can't express.
    pub fn validate(&self) -> Result<()> {
        let w = &self.pipeline_weights;
        let sum = w.ai + w.rule + w.semantic + w.behavioral + w.pattern;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Startup(format!(
                "pipeline_weights must sum to 1.0, got {sum:.4}"
            )));
        }
        Ok(())
    }

    /// Convert the configured throttle windows into an `AlertConfig`.
    #[must_use]
    pub fn alert_config(&self) -> siteward_alerts::alert::AlertConfig {
        siteward_alerts::alert::AlertConfig {
            critical_window: chrono::Duration::minutes(self.alert_throttle.critical_minutes),
            high_window: chrono::Duration::minutes(self.alert_throttle.high_minutes),
            medium_window: chrono::Duration::minutes(self.alert_throttle.medium_minutes),
            low_window: chrono::Duration::minutes(self.alert_throttle.low_minutes),
        }
    }

    /// Convert the configured fusion weights into a `ClassifierWeights`.
    #[must_use]
    pub fn classifier_weights(&self) -> siteward_core::ClassifierWeights {
        siteward_core::ClassifierWeights {
            ai: self.pipeline_weights.ai,
            rule: self.pipeline_weights.rule,
            semantic: self.pipeline_weights.semantic,
            behavioral: self.pipeline_weights.behavioral,
            pattern_match: self.pipeline_weights.pattern,
        }
    }
}

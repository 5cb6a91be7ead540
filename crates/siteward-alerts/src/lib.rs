//! # siteward-alerts
//!
//! Turns a `siteward_core::PipelineResult` into an alert, routes that
//! alert to notification channels with throttling, and tracks the
//! feedback/performance loop that closes over the pipeline's accuracy
//! over time.
//!
//! ## Modules
//!
//! - [`alert`] — gate, severity, escalation, suppression
//! - [`channels`] — delivery channel abstraction
//! - [`notification`] — template-driven routing
//! - [`feedback`] — analyst/chat correction log and retraining signal
//! - [`performance`] — rolling precision/recall/F1 metrics and trends

pub mod alert;
pub mod channels;
pub mod error;
pub mod feedback;
pub mod notification;
pub mod performance;

pub use alert::{Alert, AlertConfig, AlertContext, AlertGenerator, AlertSeverity, AlertType, EscalationFactors};
pub use channels::{NotificationChannel, WebhookChannel, WebhookConfig};
pub use error::{Error, Result};
pub use feedback::{Feedback, FeedbackCollector, FeedbackInput, FeedbackKind, FeedbackSource};
pub use notification::{default_templates, NotificationRouter, NotificationTemplate};
pub use performance::{LabeledOutcome, PerformanceMetrics, PerformanceTracker, TrendPoint};

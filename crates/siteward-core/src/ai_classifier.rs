//! LLM-as-judge defacement classification.
//!
//! A prompt builder, a JSON response with markdown-fence stripping,
//! and a semaphore-gated batch path. A parse failure here must not
//! bubble up as an error: the pipeline treats "the model said
//! something we couldn't parse" as a low-confidence `Unclear` verdict
//! rather than a missing signal, so one bad completion doesn't knock
//! out the whole vote.

use crate::error::{Error, Result};
use crate::model::Classification;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Content longer than this is truncated before being sent to a model.
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Default number of concurrent in-flight model calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Minimum spacing between calls placed on the same classifier, to
/// respect per-key rate limits regardless of concurrency.
pub const MIN_CALL_INTERVAL: Duration = Duration::from_millis(200);

/// One of the named analysis prompt variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// General-purpose defacement/compromise analysis.
    GeneralAnalysis,
    /// Focused on injected script/backdoor content.
    ContentInjection,
    /// Focused on visual/branding defacement cues.
    VisualDefacement,
}

impl PromptKind {
    fn registry_key(self) -> &'static str {
        match self {
            PromptKind::GeneralAnalysis => "general_analysis",
            PromptKind::ContentInjection => "content_injection",
            PromptKind::VisualDefacement => "visual_defacement",
        }
    }
}

/// Prompt templates keyed by `PromptKind`: a fixed map from a name to
/// a format string.
pub struct PromptLibrary;

impl PromptLibrary {
    /// Render the prompt for `kind` against `content`, truncating to
    /// `MAX_CONTENT_CHARS` first.
    #[must_use]
    pub fn render(kind: PromptKind, url: &str, content: &str) -> String {
        let truncated = truncate_content(content);
        let rubric = match kind {
            PromptKind::GeneralAnalysis => GENERAL_ANALYSIS_RUBRIC,
            PromptKind::ContentInjection => CONTENT_INJECTION_RUBRIC,
            PromptKind::VisualDefacement => VISUAL_DEFACEMENT_RUBRIC,
        };
        format!(
            "You are a security analyst assessing whether a website has been \
             compromised or defaced.\n\nPrompt: {}\nURL: {url}\nCONTENT:\n{truncated}\n\n{rubric}\n\n\
             Respond with ONLY a valid JSON object (no markdown fences, no prose \
             outside the object):\n\
             {{\n  \"classification\": \"benign\" | \"defacement\" | \"unclear\",\n  \
             \"confidence\": <0.0-1.0>,\n  \"reasoning\": \"<2-4 sentences>\",\n  \
             \"risk_indicators\": [\"...\"],\n  \"benign_indicators\": [\"...\"],\n  \
             \"recommended_action\": \"monitor\" | \"alert\" | \"investigate\" | \"ignore\",\n  \
             \"severity\": \"low\" | \"medium\" | \"high\" | \"critical\"\n}}",
            kind.registry_key(),
        )
    }
}

const GENERAL_ANALYSIS_RUBRIC: &str = "Look broadly for defacement banners, hacker \
    signatures, unauthorized content replacement, or any sign the page is not serving \
    its intended content.";
const CONTENT_INJECTION_RUBRIC: &str = "Focus specifically on injected scripts, hidden \
    iframes, obfuscated JavaScript, and backdoor-style code mixed into otherwise normal \
    markup.";
const VISUAL_DEFACEMENT_RUBRIC: &str = "Focus specifically on visual/branding cues: \
    replaced logos, hacker group names, political or ideological banners, and claims of \
    having compromised the site.";

fn truncate_content(content: &str) -> &str {
    if content.len() <= MAX_CONTENT_CHARS {
        return content;
    }
    let mut end = MAX_CONTENT_CHARS;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// A chat-completion backend. Implementations wrap whatever transport
/// actually talks to the model provider; this trait exists so the
/// classifier and its tests never depend on one.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Identifier surfaced in `ClassificationResult::model_id`.
    fn model_id(&self) -> &str;
}

/// Raw JSON shape the prompt asks the model for, matching the
/// external response schema verbatim. `risk_indicators`/
/// `benign_indicators`/`recommended_action`/`severity` are accepted
/// but not currently surfaced on `ClassificationResult`, which has no
/// matching fields; they fold into `reasoning` instead of being
/// dropped silently.
#[derive(Debug, Deserialize)]
struct RawResponse {
    classification: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    risk_indicators: Vec<String>,
    #[serde(default)]
    recommended_action: Option<String>,
}

/// Parsed shape of a model's JSON response, before being lifted into
/// `ClassificationResult` (which also carries `model_id`/`timestamp`).
struct RawVerdict {
    label: Classification,
    confidence: f64,
    explanation: String,
    reasoning: String,
}

/// Parse a model completion into a verdict, stripping markdown fences
/// first. Parse failures are
/// reported as an error so the caller can decide how to degrade;
/// `AiClassifier::classify` itself turns that into an `Unclear` verdict
/// rather than propagating it. An unrecognized `classification` string
/// collapses to `Unclear` per the external schema's stated fallback
/// rather than failing the whole parse.
fn parse_response(response: &str) -> std::result::Result<RawVerdict, serde_json::Error> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let raw: RawResponse = serde_json::from_str(cleaned)?;

    let label = match raw.classification.to_lowercase().as_str() {
        "benign" => Classification::Benign,
        "defacement" => Classification::Defacement,
        _ => Classification::Unclear,
    };

    let explanation = raw
        .recommended_action
        .clone()
        .unwrap_or_else(|| raw.reasoning.chars().take(120).collect());

    let reasoning = if raw.risk_indicators.is_empty() {
        raw.reasoning
    } else {
        format!("{}; risk indicators: {}", raw.reasoning, raw.risk_indicators.join(", "))
    };

    Ok(RawVerdict {
        label,
        confidence: raw.confidence,
        explanation,
        reasoning,
    })
}

/// Rate limiter shared across concurrent calls to one backend: a
/// semaphore bounds concurrency, an atomic timestamp enforces a
/// minimum interval between successive permits being granted.
struct RateLimiter {
    semaphore: Semaphore,
    last_call_millis: AtomicI64,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(max_concurrency: usize, min_interval: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrency),
            last_call_millis: AtomicI64::new(0),
            min_interval,
        }
    }

    async fn acquire(&self) -> tokio::sync::SemaphorePermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        let min_interval_ms = self.min_interval.as_millis() as i64;
        loop {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let last = self.last_call_millis.load(Ordering::SeqCst);
            let elapsed = now_ms - last;
            if elapsed >= min_interval_ms {
                if self
                    .last_call_millis
                    .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    break;
                }
                continue;
            }
            tokio::time::sleep(Duration::from_millis((min_interval_ms - elapsed) as u64)).await;
        }
        permit
    }
}

/// Semaphore- and interval-limited wrapper around a `ChatBackend`,
/// used by the pipeline to stay within provider rate limits under
/// concurrent site checks.
pub struct AiClassifier {
    backend: Arc<dyn ChatBackend>,
    limiter: RateLimiter,
}

impl AiClassifier {
    /// Build a classifier with the default concurrency and interval.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_limits(backend, DEFAULT_MAX_CONCURRENCY, MIN_CALL_INTERVAL)
    }

    /// Build a classifier with explicit rate-limit parameters.
    #[must_use]
    pub fn with_limits(
        backend: Arc<dyn ChatBackend>,
        max_concurrency: usize,
        min_interval: Duration,
    ) -> Self {
        Self {
            backend,
            limiter: RateLimiter::new(max_concurrency, min_interval),
        }
    }

    /// Classify `content` under the given prompt, rate-limited.
    ///
    /// A malformed model response degrades to
    /// `(Unclear, 0.3, "parse failure")` rather than propagating an
    /// error, so one bad completion doesn't remove the AI vote from
    /// the pipeline entirely.
    pub async fn classify(
        &self,
        kind: PromptKind,
        url: &str,
        content: &str,
    ) -> Result<crate::model::ClassificationResult> {
        let prompt = PromptLibrary::render(kind, url, content);

        let _permit = self.limiter.acquire().await;
        let raw = self
            .backend
            .complete(&prompt)
            .await
            .map_err(|e| Error::Collaborator(e.to_string()))?;

        let verdict = match parse_response(&raw) {
            Ok(v) => v,
            Err(_) => RawVerdict {
                label: Classification::Unclear,
                confidence: 0.3,
                explanation: "parse failure".to_string(),
                reasoning: "model response could not be parsed as the expected JSON shape"
                    .to_string(),
            },
        };

        Ok(crate::model::ClassificationResult {
            label: verdict.label,
            confidence: verdict.confidence.clamp(0.0, 1.0),
            explanation: verdict.explanation,
            reasoning: verdict.reasoning,
            tokens_used: None,
            model_id: self.backend.model_id().to_string(),
            timestamp: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticBackend {
        response: String,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChatBackend for StaticBackend {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.clone())
        }

        fn model_id(&self) -> &str {
            "static-test-model"
        }
    }

    #[test]
    fn truncate_content_respects_char_boundaries() {
        let content = "a".repeat(MAX_CONTENT_CHARS + 10);
        let truncated = truncate_content(&content);
        assert_eq!(truncated.len(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn prompt_render_includes_truncated_content_and_kind() {
        let rendered = PromptLibrary::render(PromptKind::ContentInjection, "http://x.test", "hi");
        assert!(rendered.contains("content_injection"));
        assert!(rendered.contains("http://x.test"));
        assert!(rendered.contains("hi"));
    }

    #[test]
    fn parse_response_strips_markdown_fences() {
        let fenced = "```json\n{\"classification\":\"defacement\",\"confidence\":0.9,\"reasoning\":\"r\"}\n```";
        let verdict = parse_response(fenced).expect("should parse");
        assert_eq!(verdict.label, Classification::Defacement);
        assert!((verdict.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn parse_response_collapses_unknown_classification_to_unclear() {
        let body = r#"{"classification":"compromised","confidence":0.6,"reasoning":"r"}"#;
        let verdict = parse_response(body).expect("should parse");
        assert_eq!(verdict.label, Classification::Unclear);
    }

    #[tokio::test]
    async fn malformed_response_degrades_to_unclear_low_confidence() {
        let backend = Arc::new(StaticBackend {
            response: "not json at all".to_string(),
            calls: Mutex::new(0),
        });
        let classifier = AiClassifier::with_limits(backend, 5, Duration::from_millis(0));
        let result = classifier
            .classify(PromptKind::GeneralAnalysis, "http://x.test", "content")
            .await
            .expect("classify should not error on parse failure");
        assert_eq!(result.label, Classification::Unclear);
        assert!((result.confidence - 0.3).abs() < 1e-9);
        assert_eq!(result.explanation, "parse failure");
    }

    #[tokio::test]
    async fn well_formed_response_round_trips() {
        let backend = Arc::new(StaticBackend {
            response: r#"{"classification":"benign","confidence":0.85,"reasoning":"no indicators"}"#.to_string(),
            calls: Mutex::new(0),
        });
        let classifier = AiClassifier::with_limits(backend, 5, Duration::from_millis(0));
        let result = classifier
            .classify(PromptKind::VisualDefacement, "http://x.test", "content")
            .await
            .unwrap();
        assert_eq!(result.label, Classification::Benign);
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.model_id, "static-test-model");
    }
}

//! Regex pattern bank → threat indicators, category, confidence.

use crate::model::{Classification, RuleBasedResult, ThreatCategory, ThreatIndicator};
use crate::patterns::{BENIGN_BANK, THREAT_BANK};
use std::collections::{HashMap, HashSet};

/// Matches-per-pattern cap.
const MAX_MATCHES_PER_PATTERN: usize = 3;

/// Context window radius around a match, in characters.
const CONTEXT_RADIUS: usize = 50;

/// Stateless rule engine over the compiled pattern bank.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    /// Classify a set of textual fragments.
    ///
    /// `context` (site URL, etc.) is accepted for interface parity with
    /// the spec but is not currently consulted by any pattern — the
    /// bank matches page content only.
    #[must_use]
    pub fn classify(&self, fragments: &[String], _context: &HashMap<String, String>) -> RuleBasedResult {
        if fragments.is_empty() {
            return RuleBasedResult {
                label: Classification::Benign,
                confidence: 0.0,
                triggered_rules: vec![],
                rule_scores: HashMap::new(),
                indicators: vec![],
                primary_category: ThreatCategory::Unknown,
                reasoning: "no content to analyze".to_string(),
            };
        }

        // Step 1: join with a single space; cross-fragment matches are
        // deliberately impossible since fragments only touch at a
        // single joining space, never inside a pattern's look-around.
        let joined = fragments.join(" ");

        let mut indicators = Vec::new();
        let mut rule_scores: HashMap<String, f64> = HashMap::new();
        let mut triggered_rules: Vec<String> = Vec::new();
        let mut category_scores: HashMap<ThreatCategory, f64> = HashMap::new();
        let mut triggered_categories: HashSet<ThreatCategory> = HashSet::new();

        for pattern in THREAT_BANK.iter() {
            let matches: Vec<_> = pattern.regex.find_iter(&joined).take(MAX_MATCHES_PER_PATTERN).collect();
            if matches.is_empty() {
                continue;
            }
            triggered_rules.push(pattern.regex.as_str().to_string());
            triggered_categories.insert(pattern.category);
            *rule_scores.entry(pattern.regex.as_str().to_string()).or_insert(0.0) += pattern.confidence;
            *category_scores.entry(pattern.category).or_insert(0.0) += pattern.confidence;

            for m in matches {
                let start = m.start().saturating_sub(CONTEXT_RADIUS);
                let end = (m.end() + CONTEXT_RADIUS).min(joined.len());
                let context = safe_slice(&joined, start, end);
                indicators.push(ThreatIndicator {
                    pattern: pattern.regex.as_str().to_string(),
                    category: pattern.category,
                    confidence: pattern.confidence,
                    matched_text: m.as_str().to_string(),
                    context,
                });
            }
        }

        let mut benign_score = 0.0;
        for pattern in BENIGN_BANK.iter() {
            if pattern.regex.is_match(&joined) {
                benign_score += pattern.confidence;
            }
        }

        let total: f64 = category_scores.values().sum::<f64>() + benign_score;
        let mut confidence = total.abs().clamp(0.0, 1.0);

        let primary_category = category_scores
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(cat, _)| *cat)
            .unwrap_or(ThreatCategory::Unknown);

        let mut label = if confidence >= 0.7 {
            Classification::Defacement
        } else if confidence >= 0.4 {
            Classification::Unclear
        } else {
            Classification::Benign
        };

        // Step 7: >= 3 distinct triggered categories boosts confidence.
        if triggered_categories.len() >= 3 {
            confidence = (confidence * 1.2).clamp(0.0, 1.0);
            label = if confidence >= 0.7 {
                Classification::Defacement
            } else if confidence >= 0.4 {
                Classification::Unclear
            } else {
                Classification::Benign
            };
        }

        let reasoning = build_reasoning(label, confidence, primary_category, &triggered_categories, &category_scores, &rule_scores);

        RuleBasedResult {
            label,
            confidence,
            triggered_rules,
            rule_scores,
            indicators,
            primary_category,
            reasoning,
        }
    }
}

fn safe_slice(s: &str, start: usize, end: usize) -> String {
    // `start`/`end` are byte offsets from `Regex::find`, which always
    // land on char boundaries for UTF-8 input that regex itself
    // produced the match against; clamp defensively anyway.
    let mut start = start;
    let mut end = end.min(s.len());
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    while end > start && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[start..end].to_string()
}

fn build_reasoning(
    label: Classification,
    confidence: f64,
    primary_category: ThreatCategory,
    triggered_categories: &HashSet<ThreatCategory>,
    category_scores: &HashMap<ThreatCategory, f64>,
    rule_scores: &HashMap<String, f64>,
) -> String {
    let band = match label {
        Classification::Defacement => "high-confidence defacement signal",
        Classification::Unclear => "ambiguous signal",
        Classification::Benign => "no significant signal",
    };

    let others: Vec<String> = triggered_categories
        .iter()
        .filter(|c| **c != primary_category)
        .map(|c| format!("{c:?}"))
        .collect();

    let mut top_rules: Vec<(&String, &f64)> = rule_scores.iter().collect();
    top_rules.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_three: Vec<String> = top_rules.into_iter().take(3).map(|(p, _)| p.clone()).collect();

    let severity_cue = if confidence >= 0.9 {
        "severity: critical"
    } else if confidence >= 0.7 {
        "severity: high"
    } else if confidence >= 0.4 {
        "severity: moderate"
    } else {
        "severity: low"
    };

    let _ = category_scores; // only the arg-max category currently feeds the reasoning string
    format!(
        "{band} (confidence {confidence:.2}); primary category {primary_category:?}{}; top rules: {}; {severity_cue}",
        if others.is_empty() {
            String::new()
        } else {
            format!("; also triggered: {}", others.join(", "))
        },
        if top_three.is_empty() { "none".to_string() } else { top_three.join(", ") },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input_is_benign_with_zero_confidence() {
        let result = RuleEngine.classify(&[], &HashMap::new());
        assert_eq!(result.label, Classification::Benign);
        assert_eq!(result.confidence, 0.0);
        assert!(result.indicators.is_empty());
    }

    #[test]
    fn classic_deface_banner_scores_high_confidence_defacement() {
        let content = frags(&["Hacked by AnonOps - rooted your server"]);
        let result = RuleEngine.classify(&content, &HashMap::new());
        assert!(result.confidence >= 0.95, "confidence was {}", result.confidence);
        assert_eq!(result.primary_category, ThreatCategory::Defacement);
        assert_eq!(result.label, Classification::Defacement);
    }

    #[test]
    fn benign_maintenance_notice_nets_negative_score() {
        let content = frags(&["We're under maintenance. Back soon. Copyright 2024."]);
        let result = RuleEngine.classify(&content, &HashMap::new());
        assert_eq!(result.label, Classification::Benign);
    }

    #[test]
    fn cryptominer_injection_is_detected_as_cryptojacking() {
        let content = frags(&[
            "<script src='coinhive.min.js'></script>",
            "new CoinHive.Anonymous('KEY')",
        ]);
        let result = RuleEngine.classify(&content, &HashMap::new());
        assert_eq!(result.primary_category, ThreatCategory::Cryptojacking);
        assert!(result.confidence >= 0.9, "confidence was {}", result.confidence);
    }

    #[test]
    fn confidence_is_always_clamped_to_unit_interval() {
        // Many overlapping high-confidence categories should never exceed 1.0.
        let content = frags(&[
            "Hacked by X defaced by Y was here we are legion cyber army rooted",
            "<script>alert(1)</script> onerror= javascript:alert(1)",
            "union select * from users; drop table users; xp_cmdshell",
        ]);
        let result = RuleEngine.classify(&content, &HashMap::new());
        assert!(result.confidence <= 1.0);
    }

    #[test]
    fn matches_capped_at_three_per_pattern() {
        let repeated = "hacked by a hacked by b hacked by c hacked by d hacked by e".to_string();
        let result = RuleEngine.classify(&[repeated], &HashMap::new());
        let hits = result
            .indicators
            .iter()
            .filter(|i| i.pattern.contains("hacked by"))
            .count();
        assert_eq!(hits, 3);
    }
}

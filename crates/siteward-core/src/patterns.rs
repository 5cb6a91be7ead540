//! The classifier pattern bank.
//!
//! The bank is plain data — a table of `(category, regex source,
//! confidence)` — compiled once into `regex::Regex` via `OnceLock`.
//! Keeping it as data (rather than scattering `Regex::new` calls
//! through the engine) is what makes "load and compile the bank once"
//! tractable and keeps the engine itself
//! pattern-agnostic.

use crate::model::ThreatCategory;
use once_cell::sync::Lazy;
use regex::Regex;

/// One entry in the pattern bank.
pub struct PatternEntry {
    /// Threat category this pattern is attributed to.
    pub category: ThreatCategory,
    /// Regex source (already includes `(?i)` where the bank wants
    /// case-insensitive matching).
    pub source: &'static str,
    /// Per-match confidence contribution, in `[0,1]`.
    pub confidence: f64,
}

/// A compiled pattern bank entry.
pub struct CompiledPattern {
    /// Threat category this pattern is attributed to.
    pub category: ThreatCategory,
    /// Compiled matcher.
    pub regex: Regex,
    /// Per-match confidence contribution, in `[0,1]`.
    pub confidence: f64,
}

/// Raw threat-indicator pattern table.
const THREAT_PATTERNS: &[PatternEntry] = &[
    // Defacement
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)hacked by \w+", confidence: 0.95 },
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)defaced by \w+", confidence: 0.98 },
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)was here", confidence: 0.85 },
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)we are legion", confidence: 0.85 },
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)cyber (team|army|warriors?)", confidence: 0.80 },
    PatternEntry { category: ThreatCategory::Defacement, source: r"(?i)\brooted\b", confidence: 0.80 },
    // Cryptojacking
    PatternEntry { category: ThreatCategory::Cryptojacking, source: r"(?i)coinhive\.min\.js", confidence: 0.95 },
    PatternEntry { category: ThreatCategory::Cryptojacking, source: r"(?i)new CoinHive\.(User|Anonymous)", confidence: 0.95 },
    PatternEntry { category: ThreatCategory::Cryptojacking, source: r"stratum\+tcp://", confidence: 0.85 },
    PatternEntry { category: ThreatCategory::Cryptojacking, source: r"\b4[0-9AB][1-9A-HJ-NP-Za-km-z]{93}\b", confidence: 0.75 },
    // SQL injection
    PatternEntry { category: ThreatCategory::SqlInjection, source: r"(?i)union\s+select", confidence: 0.90 },
    PatternEntry { category: ThreatCategory::SqlInjection, source: r"(?i)drop\s+(table|database)", confidence: 0.95 },
    PatternEntry { category: ThreatCategory::SqlInjection, source: r"(?i)xp_cmdshell", confidence: 0.95 },
    // XSS
    PatternEntry { category: ThreatCategory::Xss, source: r"(?i)<script[^>]*>", confidence: 0.85 },
    PatternEntry { category: ThreatCategory::Xss, source: r"(?i)on(load|error|click|mouseover|focus)\s*=", confidence: 0.75 },
    PatternEntry { category: ThreatCategory::Xss, source: r"(?i)javascript\s*:", confidence: 0.80 },
    // Backdoor
    PatternEntry { category: ThreatCategory::Backdoor, source: r"(?i)eval\s*\(\s*\$_(GET|POST|REQUEST|COOKIE)", confidence: 0.95 },
    PatternEntry { category: ThreatCategory::Backdoor, source: r"(?i)base64_decode\s*\(", confidence: 0.75 },
    // Phishing
    PatternEntry { category: ThreatCategory::Phishing, source: r"(?i)please\s+verify\s+your\s+(account|password|identity)", confidence: 0.75 },
    PatternEntry { category: ThreatCategory::Phishing, source: r"(?i)(paypal|apple|microsoft)\s+security\s+(alert|notice)", confidence: 0.80 },
    // Malware
    PatternEntry { category: ThreatCategory::Malware, source: r#"(?i)<iframe[^>]*style\s*=\s*["'][^"']*display:\s*none"#, confidence: 0.85 },
    PatternEntry { category: ThreatCategory::Malware, source: r"(?i)eval\(unescape\(", confidence: 0.80 },
    PatternEntry { category: ThreatCategory::Malware, source: r"(?i)eval\(String\.fromCharCode", confidence: 0.65 },
];

/// Benign indicators: negative-weighted, reduce confidence when present.
const BENIGN_PATTERNS: &[PatternEntry] = &[
    PatternEntry { category: ThreatCategory::Unknown, source: r"(?i)under\s+maintenance", confidence: -0.3 },
    PatternEntry { category: ThreatCategory::Unknown, source: r"(?i)copyright\s+©?\s*20\d{2}", confidence: -0.1 },
    PatternEntry { category: ThreatCategory::Unknown, source: r"(?i)privacy\s+policy", confidence: -0.05 },
];

fn compile_bank(entries: &'static [PatternEntry]) -> Vec<CompiledPattern> {
    entries
        .iter()
        .map(|e| CompiledPattern {
            category: e.category,
            regex: Regex::new(e.source).unwrap_or_else(|err| {
                panic!("pattern bank entry `{}` failed to compile: {err}", e.source)
            }),
            confidence: e.confidence,
        })
        .collect()
}

/// Compiled threat-indicator bank, built once.
pub static THREAT_BANK: Lazy<Vec<CompiledPattern>> = Lazy::new(|| compile_bank(THREAT_PATTERNS));

/// Compiled benign-indicator bank, built once.
pub static BENIGN_BANK: Lazy<Vec<CompiledPattern>> = Lazy::new(|| compile_bank(BENIGN_PATTERNS));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_in_both_banks_compiles() {
        assert!(!THREAT_BANK.is_empty());
        assert!(!BENIGN_BANK.is_empty());
    }

    #[test]
    fn all_seven_categories_are_represented() {
        for cat in ThreatCategory::PATTERN_CATEGORIES {
            assert!(
                THREAT_BANK.iter().any(|p| p.category == cat),
                "missing patterns for category {cat:?}"
            );
        }
    }

    #[test]
    fn benign_patterns_are_negatively_weighted() {
        assert!(BENIGN_BANK.iter().all(|p| p.confidence < 0.0));
    }
}

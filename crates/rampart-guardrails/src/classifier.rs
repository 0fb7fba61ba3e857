//! Prompt-injection detection and risk aggregation
//!
//! Two matcher tiers over input text: a small bank of high-confidence
//! override/jailbreak phrasings (every hit is critical) and a broader
//! keyword set that only ever produces warnings. Output analysis flags
//! harmful content, hallucination hedging, and external links; it never
//! disallows.

use aho_corasick::AhoCorasick;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::{RiskLevel, Severity, Violation, ViolationType};

/// Inputs beyond this many characters are themselves a violation.
pub(crate) const MAX_INPUT_CHARS: usize = 100_000;

/// Matched substrings stored on a violation are capped to this length.
const MAX_MATCHED_CHARS: usize = 100;

struct InjectionPattern {
    id: &'static str,
    name: &'static str,
    regex: Regex,
}

fn injection_pattern(id: &'static str, name: &'static str, pattern: &str) -> Option<InjectionPattern> {
    match Regex::new(pattern) {
        Ok(regex) => Some(InjectionPattern { id, name, regex }),
        Err(e) => {
            warn!("Skipping invalid injection pattern {}: {}", id, e);
            None
        }
    }
}

/// High-confidence override/jailbreak phrasings. Every hit is critical.
fn override_patterns() -> Vec<InjectionPattern> {
    [
        injection_pattern(
            "gr-pi-001",
            "Ignore previous instructions",
            r"(?i)ignore\s+(all\s+)?(previous|prior|above|earlier)\s+(instructions|prompts|directives|rules)",
        ),
        injection_pattern(
            "gr-pi-002",
            "Disregard prior context",
            r"(?i)disregard\s+(all\s+)?(prior|previous|earlier|above)\b",
        ),
        injection_pattern(
            "gr-pi-003",
            "Reveal system configuration",
            r"(?i)(reveal|show|print|repeat)\s+(your\s+)?(system\s+prompt|initial\s+instructions|hidden\s+instructions)",
        ),
        injection_pattern(
            "gr-pi-004",
            "Override safety controls",
            r"(?i)override\s+(safety|security|content|ethical)\s*(filters?|policies|restrictions|guidelines|rules)?",
        ),
        injection_pattern(
            "gr-pi-005",
            "Forget instructions",
            r"(?i)forget\s+(all\s+|everything\s+)?(about\s+)?(your|the|all)\s+(instructions|rules|guidelines|training)",
        ),
        injection_pattern(
            "gr-pi-006",
            "Pretend no rules",
            r"(?i)(pretend|imagine|act\s+as\s+if)\s+(you\s+)?(have\s+)?no\s+(rules|restrictions|limits|guidelines)",
        ),
        injection_pattern(
            "gr-jb-001",
            "DAN jailbreak",
            r"(?i)\bDAN\s+(mode|prompt)\b|do\s+anything\s+now",
        ),
        injection_pattern(
            "gr-jb-002",
            "Developer mode",
            r"(?i)developer\s+mode\s+(enabled|activated|on)",
        ),
        injection_pattern(
            "gr-pi-007",
            "Chat template token",
            r"(?i)<\|?(system|im_start|endoftext)\|?>|\[INST\]|<<SYS>>",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Low-confidence keywords; hits only ever produce warnings.
const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "jailbreak",
    "bypass restrictions",
    "without any filter",
    "unfiltered",
    "uncensored",
    "no limitations",
    "hypothetically speaking",
    "roleplay as",
    "secret instructions",
    "exfiltrate",
];

/// Hedging phrasings suggesting fabricated or unverifiable content.
const HEDGING_PHRASES: &[&str] = &[
    "as an ai language model",
    "i cannot verify",
    "i don't have access to real-time",
    "as of my last update",
    "i may be mistaken about",
    "my training data",
];

struct HarmfulPattern {
    id: &'static str,
    regex: Regex,
}

fn harmful_patterns() -> Vec<HarmfulPattern> {
    [
        (
            "gr-hc-001",
            r"(?i)how\s+to\s+(make|build|create)\s+(a\s+)?(bomb|explosive|weapon)",
        ),
        (
            "gr-hc-002",
            r"(?i)\b(kill|harm|hurt|poison)\s+(yourself|himself|herself|themselves|someone|people)\b",
        ),
        (
            "gr-hc-003",
            r"(?i)step[-\s]by[-\s]step\s+.{0,40}(hack|steal|break\s+into)",
        ),
    ]
    .into_iter()
    .filter_map(|(id, pattern)| match Regex::new(pattern) {
        Ok(regex) => Some(HarmfulPattern { id, regex }),
        Err(e) => {
            warn!("Skipping invalid harmful-content pattern {}: {}", id, e);
            None
        }
    })
    .collect()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Matcher banks applied around the external model invocation.
pub struct RiskClassifier {
    overrides: Vec<InjectionPattern>,
    keywords: AhoCorasick,
    harmful: Vec<HarmfulPattern>,
    hedging: AhoCorasick,
    links: Option<Regex>,
}

impl RiskClassifier {
    pub fn new() -> Self {
        let keywords = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(SUSPICIOUS_KEYWORDS)
            .expect("static keyword bank builds");
        let hedging = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(HEDGING_PHRASES)
            .expect("static phrase bank builds");
        Self {
            overrides: override_patterns(),
            keywords,
            harmful: harmful_patterns(),
            hedging,
            links: Regex::new(r#"https?://[^\s"'<>)]+"#).ok(),
        }
    }

    /// Scan input text. Returns violations and warnings; the caller
    /// aggregates them into a risk level.
    pub fn analyze_input(&self, text: &str) -> (Vec<Violation>, Vec<String>) {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        if text.chars().count() > MAX_INPUT_CHARS {
            violations.push(Violation {
                violation_type: ViolationType::OversizedInput,
                severity: Severity::High,
                description: format!("input exceeds {MAX_INPUT_CHARS} characters"),
                pattern_id: None,
                matched: Vec::new(),
            });
            // Cap what the matchers see; the violation already covers the
            // remainder.
        }
        let text = truncate_chars(text, MAX_INPUT_CHARS);

        for pattern in &self.overrides {
            if let Some(m) = pattern.regex.find(text) {
                debug!(pattern = pattern.id, "override phrasing matched");
                violations.push(Violation {
                    violation_type: ViolationType::PromptInjection,
                    severity: Severity::Critical,
                    description: pattern.name.to_string(),
                    pattern_id: Some(pattern.id.to_string()),
                    matched: vec![truncate_chars(m.as_str(), MAX_MATCHED_CHARS).to_string()],
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for hit in self.keywords.find_iter(text) {
            if seen.insert(hit.pattern()) {
                warnings.push(format!(
                    "suspicious keyword: {}",
                    SUSPICIOUS_KEYWORDS[hit.pattern().as_usize()]
                ));
            }
        }

        (violations, warnings)
    }

    /// Scan output text. Only ever yields medium-severity violations and
    /// warnings; output analysis never disallows.
    pub fn analyze_output(&self, text: &str) -> (Vec<Violation>, Vec<String>) {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        for pattern in &self.harmful {
            if let Some(m) = pattern.regex.find(text) {
                violations.push(Violation {
                    violation_type: ViolationType::HarmfulContent,
                    severity: Severity::Medium,
                    description: "harmful content phrasing".to_string(),
                    pattern_id: Some(pattern.id.to_string()),
                    matched: vec![truncate_chars(m.as_str(), MAX_MATCHED_CHARS).to_string()],
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for hit in self.hedging.find_iter(text) {
            if seen.insert(hit.pattern()) {
                warnings.push(format!(
                    "hallucination hedging: {}",
                    HEDGING_PHRASES[hit.pattern().as_usize()]
                ));
            }
        }

        if let Some(links) = &self.links {
            let count = links.find_iter(text).count();
            if count > 0 {
                warnings.push(format!("output contains {count} external link(s)"));
            }
        }

        (violations, warnings)
    }

    /// Input risk aggregation: any critical violation makes the text
    /// critical and disallowed; any high makes it high and disallowed; any
    /// medium violation or any warning yields medium, allowed; else low.
    pub fn aggregate_input(violations: &[Violation], warnings: &[String]) -> (RiskLevel, bool) {
        if violations.iter().any(|v| v.severity == Severity::Critical) {
            (RiskLevel::Critical, false)
        } else if violations.iter().any(|v| v.severity == Severity::High) {
            (RiskLevel::High, false)
        } else if !violations.is_empty() || !warnings.is_empty() {
            (RiskLevel::Medium, true)
        } else {
            (RiskLevel::Low, true)
        }
    }
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new()
    }
}

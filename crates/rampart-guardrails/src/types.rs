//! Type definitions for the guardrails surface

use serde::{Deserialize, Serialize};

/// How dangerous a piece of text is judged to be. Totally ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Combined risk over an input/output pair: the maximum of the two.
    pub fn combined(a: RiskLevel, b: RiskLevel) -> RiskLevel {
        a.max(b)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Severity attached to a single violation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// What kind of guardrail rule was violated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    PromptInjection,
    OversizedInput,
    HarmfulContent,
    PiiExposure,
    Hallucination,
    ExternalLink,
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PromptInjection => write!(f, "prompt_injection"),
            Self::OversizedInput => write!(f, "oversized_input"),
            Self::HarmfulContent => write!(f, "harmful_content"),
            Self::PiiExposure => write!(f, "pii_exposure"),
            Self::Hallucination => write!(f, "hallucination"),
            Self::ExternalLink => write!(f, "external_link"),
        }
    }
}

/// One detected violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
    pub pattern_id: Option<String>,
    #[serde(default)]
    pub matched: Vec<String>,
}

/// Result of one guardrail check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub allowed: bool,
    pub risk: RiskLevel,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    /// Redacted text, present when sanitization changed anything
    pub sanitized: Option<String>,
}

impl GuardrailResult {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// Combined assessment over one input/output pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub input: GuardrailResult,
    pub output: GuardrailResult,
    pub overall_risk: RiskLevel,
}

/// Caller-supplied context carried into logs and the violation journal
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    /// Label for the calling channel or session, if any
    pub source: Option<String>,
}

impl CheckContext {
    pub fn labeled(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RiskLevel::Low, RiskLevel::Low, RiskLevel::Low)]
    #[test_case(RiskLevel::Low, RiskLevel::Medium, RiskLevel::Medium)]
    #[test_case(RiskLevel::High, RiskLevel::Medium, RiskLevel::High)]
    #[test_case(RiskLevel::Critical, RiskLevel::Low, RiskLevel::Critical)]
    #[test_case(RiskLevel::Medium, RiskLevel::Critical, RiskLevel::Critical)]
    fn test_combined_is_max(a: RiskLevel, b: RiskLevel, expected: RiskLevel) {
        assert_eq!(RiskLevel::combined(a, b), expected);
        assert_eq!(RiskLevel::combined(b, a), expected);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_result_serialization_roundtrip() {
        let result = GuardrailResult {
            allowed: false,
            risk: RiskLevel::Critical,
            violations: vec![Violation {
                violation_type: ViolationType::PromptInjection,
                severity: Severity::Critical,
                description: "override phrasing".to_string(),
                pattern_id: Some("gr-pi-001".to_string()),
                matched: vec!["ignore previous instructions".to_string()],
            }],
            warnings: vec!["suspicious keyword: jailbreak".to_string()],
            sanitized: None,
        };

        let json = serde_json::to_string(&result).expect("serializes");
        assert!(json.contains("\"risk\":\"critical\""));
        let back: GuardrailResult = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.violations.len(), 1);
        assert_eq!(back.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_max_severity() {
        let result = GuardrailResult {
            allowed: false,
            risk: RiskLevel::High,
            violations: vec![
                Violation {
                    violation_type: ViolationType::PromptInjection,
                    severity: Severity::High,
                    description: String::new(),
                    pattern_id: None,
                    matched: vec![],
                },
                Violation {
                    violation_type: ViolationType::ExternalLink,
                    severity: Severity::Low,
                    description: String::new(),
                    pattern_id: None,
                    matched: vec![],
                },
            ],
            warnings: vec![],
            sanitized: None,
        };
        assert_eq!(result.max_severity(), Some(Severity::High));
    }
}

//! Guardrail surface wrapping the classifier, PII detector, and metrics

use tracing::{debug, info};

use crate::classifier::RiskClassifier;
use crate::metrics::{GuardrailMetrics, MetricsSnapshot};
use crate::pii::PiiDetector;
use crate::types::{
    CheckContext, ComprehensiveReport, GuardrailResult, RiskLevel, Severity, Violation,
    ViolationType,
};

/// Paired input/output guardrail around an external model invocation.
///
/// One explicitly constructed instance owns the matcher banks and metrics;
/// share it by reference and call `reset_metrics()` between tests.
pub struct Guardrails {
    classifier: RiskClassifier,
    pii: PiiDetector,
    metrics: GuardrailMetrics,
}

impl Guardrails {
    pub fn new() -> Self {
        info!("Guardrails ready");
        Self {
            classifier: RiskClassifier::new(),
            pii: PiiDetector::new(),
            metrics: GuardrailMetrics::new(),
        }
    }

    /// Replace the default PII detector, e.g. to opt into the name
    /// heuristic.
    pub fn with_pii_detector(mut self, pii: PiiDetector) -> Self {
        self.pii = pii;
        self
    }

    /// Check text headed to the model. A critical or high violation
    /// disallows the call.
    pub fn check_input(&self, text: &str, ctx: &CheckContext) -> GuardrailResult {
        let (violations, warnings) = self.classifier.analyze_input(text);
        let (risk, allowed) = RiskClassifier::aggregate_input(&violations, &warnings);

        let result = GuardrailResult {
            allowed,
            risk,
            violations,
            warnings,
            sanitized: None,
        };
        debug!(%risk, allowed, "input check complete");
        self.metrics.record(&result, ctx);
        result
    }

    /// Check text generated by the model. Never disallows: findings
    /// downgrade to sanitized content and warnings.
    pub fn check_output(&self, text: &str, ctx: &CheckContext) -> GuardrailResult {
        let (mut violations, warnings) = self.classifier.analyze_output(text);

        let pii_matches = self.pii.detect(text);
        let sanitized = if pii_matches.is_empty() {
            None
        } else {
            violations.push(Violation {
                violation_type: ViolationType::PiiExposure,
                severity: Severity::Medium,
                description: format!("{} PII span(s) redacted from output", pii_matches.len()),
                pattern_id: None,
                matched: pii_matches.iter().map(|m| m.text.clone()).collect(),
            });
            Some(self.pii.sanitize(text))
        };

        let risk = if violations.is_empty() && warnings.is_empty() {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        };

        let result = GuardrailResult {
            allowed: true,
            risk,
            violations,
            warnings,
            sanitized,
        };
        debug!(%risk, "output check complete");
        self.metrics.record(&result, ctx);
        result
    }

    /// Assess one input/output pair; the overall risk is the maximum of the
    /// two sides.
    pub fn comprehensive_check(
        &self,
        input: &str,
        output: &str,
        ctx: &CheckContext,
    ) -> ComprehensiveReport {
        let input = self.check_input(input, ctx);
        let output = self.check_output(output, ctx);
        let overall_risk = RiskLevel::combined(input.risk, output.risk);
        ComprehensiveReport {
            input,
            output,
            overall_risk,
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl Default for Guardrails {
    fn default() -> Self {
        Self::new()
    }
}

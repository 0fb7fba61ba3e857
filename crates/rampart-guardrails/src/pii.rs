//! PII detection, confidence scoring, and deterministic redaction
//!
//! Category matchers scan generated output text. Each raw match gets a
//! category base confidence, raised by structural corroboration (a payment
//! card that passes the Luhn check). Redaction replaces each match's exact
//! text with a category token; tokens contain no digits or `@`, so running
//! the sanitizer over already-redacted text changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// PII category of a match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    NationalId,
    PaymentCard,
    Address,
    Name,
    Other,
}

impl PiiCategory {
    pub fn base_confidence(self) -> f64 {
        match self {
            Self::Email => 0.95,
            Self::Phone => 0.80,
            Self::NationalId => 0.90,
            Self::PaymentCard => 0.85,
            Self::Address => 0.70,
            Self::Name => 0.60,
            Self::Other => 0.50,
        }
    }

    pub fn redaction_token(self) -> &'static str {
        match self {
            Self::Email => "[REDACTED:EMAIL]",
            Self::Phone => "[REDACTED:PHONE]",
            Self::NationalId => "[REDACTED:NATIONAL_ID]",
            Self::PaymentCard => "[REDACTED:PAYMENT_CARD]",
            Self::Address => "[REDACTED:ADDRESS]",
            Self::Name => "[REDACTED:NAME]",
            Self::Other => "[REDACTED:TOKEN]",
        }
    }
}

/// One raw detection, consumed immediately to build sanitized output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiMatch {
    pub category: PiiCategory,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("static pattern compiles")
});

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .expect("static pattern compiles")
});

static NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static pattern compiles"));

static PAYMENT_CARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b")
        .expect("static pattern compiles")
});

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,5}\s+[A-Z][a-z]+\s+(Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way)\b")
        .expect("static pattern compiles")
});

/// High-false-positive heuristic: any two capitalized words.
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").expect("static pattern compiles"));

/// Long uniform token, e.g. an opaque identifier
static GENERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z0-9]{20,}\b").expect("static pattern compiles"));

/// Luhn checksum: strip non-digits, double every second digit from the
/// right (subtracting 9 when the double exceeds 9), valid when the digit
/// sum is divisible by 10.
pub fn luhn_valid(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Category matchers plus confidence scoring and redaction.
pub struct PiiDetector {
    /// Two-capitalized-words name heuristic, off unless opted in
    detect_names: bool,
    /// Long opaque token heuristic, off unless opted in
    detect_generic_tokens: bool,
}

impl PiiDetector {
    pub fn new() -> Self {
        Self {
            detect_names: false,
            detect_generic_tokens: false,
        }
    }

    pub fn with_name_detection(mut self, enabled: bool) -> Self {
        self.detect_names = enabled;
        self
    }

    pub fn with_generic_token_detection(mut self, enabled: bool) -> Self {
        self.detect_generic_tokens = enabled;
        self
    }

    /// Scan `text` and return every raw match with its confidence score.
    pub fn detect(&self, text: &str) -> Vec<PiiMatch> {
        let mut matches = Vec::new();

        self.collect(&mut matches, text, PiiCategory::PaymentCard, &PAYMENT_CARD);
        self.collect(&mut matches, text, PiiCategory::Email, &EMAIL);
        self.collect(&mut matches, text, PiiCategory::NationalId, &NATIONAL_ID);
        self.collect(&mut matches, text, PiiCategory::Phone, &PHONE);
        self.collect(&mut matches, text, PiiCategory::Address, &ADDRESS);
        if self.detect_names {
            self.collect(&mut matches, text, PiiCategory::Name, &NAME);
        }
        if self.detect_generic_tokens {
            self.collect(&mut matches, text, PiiCategory::Other, &GENERIC_TOKEN);
        }

        // National IDs also satisfy the phone shape; keep the more specific
        // category for an identical span.
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.start.cmp(&b.start))
        });
        matches.dedup_by(|later, earlier| {
            later.start == earlier.start && later.end == earlier.end
        });

        debug!("PII scan found {} matches", matches.len());
        matches
    }

    fn collect(&self, out: &mut Vec<PiiMatch>, text: &str, category: PiiCategory, re: &Regex) {
        for m in re.find_iter(text) {
            let mut confidence = category.base_confidence();
            if category == PiiCategory::PaymentCard && luhn_valid(m.as_str()) {
                confidence = (confidence + 0.10).min(1.0);
            }
            out.push(PiiMatch {
                category,
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                confidence,
            });
        }
    }

    /// Replace every detected span with its category token.
    ///
    /// Matches are applied in descending confidence order so overlapping or
    /// nested matches resolve deterministically; each replacement is global
    /// and case-sensitive on the exact matched text. Idempotent: tokens
    /// never re-match.
    pub fn sanitize(&self, text: &str) -> String {
        let matches = self.detect(text);
        let mut sanitized = text.to_string();
        for m in &matches {
            if m.text.is_empty() {
                continue;
            }
            sanitized = sanitized.replace(&m.text, m.category.redaction_token());
        }
        sanitized
    }
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_luhn_vectors() {
        assert!(luhn_valid("4111111111111111"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(luhn_valid("4111-1111-1111-1111"));
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("no digits"));
    }

    #[test]
    fn test_detects_email_and_phone() {
        let detector = PiiDetector::new();
        let matches = detector.detect("Contact me at a@b.com or 555-123-4567");

        let email = matches
            .iter()
            .find(|m| m.category == PiiCategory::Email)
            .expect("email found");
        assert_eq!(email.text, "a@b.com");
        assert!((email.confidence - 0.95).abs() < 1e-9);

        let phone = matches
            .iter()
            .find(|m| m.category == PiiCategory::Phone)
            .expect("phone found");
        assert_eq!(phone.text, "555-123-4567");
    }

    #[test]
    fn test_card_confidence_boosted_by_luhn() {
        let detector = PiiDetector::new();
        let valid = detector.detect("card 4111111111111111 on file");
        let card = valid
            .iter()
            .find(|m| m.category == PiiCategory::PaymentCard)
            .expect("card found");
        assert!((card.confidence - 0.95).abs() < 1e-9);

        let invalid = detector.detect("card 4111111111111112 on file");
        let card = invalid
            .iter()
            .find(|m| m.category == PiiCategory::PaymentCard)
            .expect("card found");
        assert!((card.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_sanitize_replaces_with_tokens() {
        let detector = PiiDetector::new();
        let sanitized = detector.sanitize("Contact me at a@b.com or 555-123-4567");

        assert!(!sanitized.contains("a@b.com"));
        assert!(!sanitized.contains("555-123-4567"));
        assert!(sanitized.contains("[REDACTED:EMAIL]"));
        assert!(sanitized.contains("[REDACTED:PHONE]"));
    }

    #[test_case("Contact me at a@b.com or 555-123-4567")]
    #[test_case("SSN 123-45-6789, card 4111111111111111")]
    #[test_case("nothing sensitive here")]
    #[test_case("")]
    fn test_sanitize_is_idempotent(text: &str) {
        let detector = PiiDetector::new();
        let once = detector.sanitize(text);
        let twice = detector.sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_national_id_wins_over_phone_shape() {
        let detector = PiiDetector::new();
        let matches = detector.detect("SSN: 123-45-6789");
        let ssn_spans: Vec<_> = matches
            .iter()
            .filter(|m| m.text == "123-45-6789")
            .collect();
        assert_eq!(ssn_spans.len(), 1, "identical span deduplicated");
        assert_eq!(ssn_spans[0].category, PiiCategory::NationalId);
    }

    #[test]
    fn test_address_detection() {
        let detector = PiiDetector::new();
        let sanitized = detector.sanitize("Ship to 42 Baker Street please");
        assert!(sanitized.contains("[REDACTED:ADDRESS]"));
        assert!(!sanitized.contains("Baker Street"));
    }

    #[test]
    fn test_name_heuristic_is_opt_in() {
        let text = "Meeting with Jane Doe tomorrow";
        let default = PiiDetector::new();
        assert!(default.detect(text).iter().all(|m| m.category != PiiCategory::Name));

        let opted = PiiDetector::new().with_name_detection(true);
        let matches = opted.detect(text);
        let name = matches
            .iter()
            .find(|m| m.category == PiiCategory::Name)
            .expect("name heuristic fires");
        assert!((name.confidence - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_generic_token_heuristic_is_opt_in() {
        let text = "session AB12CD34EF56GH78IJ90KL12 expired";
        let opted = PiiDetector::new().with_generic_token_detection(true);
        assert!(opted
            .detect(text)
            .iter()
            .any(|m| m.category == PiiCategory::Other));
        assert!(PiiDetector::new().detect(text).is_empty());
    }

    #[test]
    fn test_matches_sorted_by_descending_confidence() {
        let detector = PiiDetector::new();
        let matches = detector.detect("a@b.com and 555-123-4567 and 4111111111111111");
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}

//! Safe matching executor and pattern admission
//!
//! A [`SafeMatcher`] is the only pattern type the engine evaluates: it is
//! always constructed from hardcoded catalog text, a fully-escaped literal,
//! or a candidate that passed the admission safety check. Raw strings never
//! reach evaluation, so "is this actually a compiled pattern" is settled by
//! the type system rather than a runtime check.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use rampart_types::{AppError, AppResult};

/// Longest pattern source accepted at admission
const MAX_PATTERN_LEN: usize = 500;
/// Most quantifiers a custom pattern may carry
const MAX_QUANTIFIERS: usize = 10;
/// Wall-clock budget for the canary probe
const CANARY_BUDGET: Duration = Duration::from_millis(100);
/// Prefix length (chars) probed when extracting the matched substring
const CAPTURE_PROBE_CHARS: usize = 1_000;
/// Stored matched values are truncated to this many chars
pub(crate) const MAX_MATCHED_CHARS: usize = 100;

/// A grouped sub-expression that is quantified inside and quantified again
/// outside, e.g. `(a+)+`: the classic catastrophic-backtracking shape.
static NESTED_QUANTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*[+*][^()]*\)\s*[+*{]").expect("static pattern compiles")
});

/// Adjacent runs of unbounded wildcards, e.g. `.*.*` or `.+.+`
static WILDCARD_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\.[*+]\??){2,}").expect("static pattern compiles"));

/// A quantified alternation group, e.g. `(a|aa)+`
static QUANTIFIED_ALTERNATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\|[^()]*\)\s*[+*{]").expect("static pattern compiles")
});

/// Anything that counts as a quantifier for the admission threshold
static QUANTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*+?]|\{\d+(?:,\d*)?\}").expect("static pattern compiles"));

/// Truncate to at most `max` characters, respecting char boundaries
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// A compiled matcher guaranteed to have originated from hardcoded or
/// fully-escaped text, or from a pattern that passed the admission check.
#[derive(Debug, Clone)]
pub struct SafeMatcher {
    regex: Regex,
}

impl SafeMatcher {
    /// Build a matcher from untrusted plain text. Every metacharacter is
    /// escaped, so the result matches the text literally and admission
    /// cannot fail.
    pub fn literal(text: &str) -> Self {
        let escaped = regex::escape(text);
        Self {
            // Escaped text is always a valid pattern.
            regex: Regex::new(&escaped).expect("escaped literal compiles"),
        }
    }

    /// Compile a hardcoded catalog pattern. Returns `None` (with a warning)
    /// instead of failing the whole catalog when a pattern is invalid.
    pub(crate) fn builtin(pattern: &str) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                warn!("Skipping invalid builtin pattern: {}", e);
                None
            }
        }
    }

    /// Admit an untrusted pattern source through the full safety pipeline:
    /// length ceiling, catastrophic-backtracking shapes, quantifier budget,
    /// compilation, and finally a canary probe against a worst-case input.
    pub fn checked(pattern: &str) -> AppResult<Self> {
        if pattern.is_empty() {
            return Err(AppError::Validation("pattern must not be empty".into()));
        }
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(AppError::Validation(format!(
                "pattern exceeds {MAX_PATTERN_LEN} characters"
            )));
        }
        if NESTED_QUANTIFIER.is_match(pattern) {
            return Err(AppError::Validation(
                "pattern contains a nested quantifier".into(),
            ));
        }
        if WILDCARD_RUN.is_match(pattern) {
            return Err(AppError::Validation(
                "pattern contains a run of unbounded wildcards".into(),
            ));
        }
        if QUANTIFIED_ALTERNATION.is_match(pattern) {
            return Err(AppError::Validation(
                "pattern contains a quantified alternation".into(),
            ));
        }
        let quantifiers = QUANTIFIER.find_iter(pattern).count();
        if quantifiers > MAX_QUANTIFIERS {
            return Err(AppError::Validation(format!(
                "pattern has {quantifiers} quantifiers, limit is {MAX_QUANTIFIERS}"
            )));
        }

        let regex = Regex::new(pattern)
            .map_err(|e| AppError::Validation(format!("pattern does not compile: {e}")))?;

        Self::canary_probe(&regex)?;

        Ok(Self { regex })
    }

    /// Probe the compiled pattern against adversarial repeated-character
    /// inputs. Rejects if the probe blows the wall-clock budget.
    fn canary_probe(regex: &Regex) -> AppResult<()> {
        let mut probe = "a".repeat(512);
        probe.push('!');

        let start = Instant::now();
        for len in [64usize, 128, 256, 512] {
            let _ = regex.is_match(&probe[..len]);
            let _ = regex.is_match(&probe[..=len]);
            if start.elapsed() > CANARY_BUDGET {
                return Err(AppError::Validation(
                    "pattern failed the worst-case probe".into(),
                ));
            }
        }
        Ok(())
    }

    /// Evaluate against a length-capped input. Inputs are capped by the
    /// caller before matching, and the regex engine runs in linear time,
    /// so this cannot stall the request.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Extract the matched substring for event storage. The probe is capped
    /// to a prefix of the input; a match beyond the probe window yields an
    /// empty capture rather than an unbounded scan.
    pub fn capture(&self, text: &str) -> Option<String> {
        if !self.is_match(text) {
            return None;
        }
        let probe = truncate_chars(text, CAPTURE_PROBE_CHARS);
        match self.regex.find(probe) {
            Some(m) => Some(truncate_chars(m.as_str(), MAX_MATCHED_CHARS).to_string()),
            None => Some(String::new()),
        }
    }

    /// Deadline-guarded evaluation. Defense in depth behind the admission
    /// check and input caps: the match races a timer and any execution
    /// failure is reported as "no match" instead of hanging the caller.
    pub async fn is_match_with_deadline(&self, text: &str, budget: Duration) -> bool {
        match self.try_match_with_deadline(text, budget).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!("{}, treating as no match", e);
                false
            }
        }
    }

    /// Like [`Self::is_match_with_deadline`] but surfaces the execution
    /// failure for callers that want to log it themselves.
    pub async fn try_match_with_deadline(&self, text: &str, budget: Duration) -> AppResult<bool> {
        let regex = self.regex.clone();
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || regex.is_match(&text));
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(matched)) => Ok(matched),
            Ok(Err(e)) => Err(AppError::MatchExecution(format!("match task failed: {e}"))),
            Err(_) => Err(AppError::MatchExecution("match deadline exceeded".into())),
        }
    }
}

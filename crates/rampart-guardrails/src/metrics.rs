//! Running guardrail metrics: violation tallies, top patterns, recent log

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{CheckContext, GuardrailResult};

/// Recent-violation log capacity; oldest entries are evicted first.
const RECENT_CAPACITY: usize = 100;

/// How many entries the top-pattern table reports by default
const TOP_PATTERNS: usize = 10;

/// One journaled violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    pub violation_type: String,
    pub severity: String,
    pub description: String,
    pub source: Option<String>,
}

/// A pattern id and how often it matched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternCount {
    pub pattern_id: String,
    pub hits: u64,
}

/// Point-in-time copy of the metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_checks: u64,
    pub blocked: u64,
    pub violations_by_type: BTreeMap<String, u64>,
    pub violations_by_severity: BTreeMap<String, u64>,
    pub top_patterns: Vec<PatternCount>,
    pub recent_violations: Vec<ViolationRecord>,
}

#[derive(Default)]
struct MetricsInner {
    total_checks: u64,
    blocked: u64,
    by_type: BTreeMap<String, u64>,
    by_severity: BTreeMap<String, u64>,
    pattern_hits: HashMap<String, u64>,
    recent: VecDeque<ViolationRecord>,
}

/// Process-wide, monotonically updated guardrail counters.
#[derive(Default)]
pub struct GuardrailMetrics {
    inner: Mutex<MetricsInner>,
}

impl GuardrailMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one check result into the counters.
    pub fn record(&self, result: &GuardrailResult, ctx: &CheckContext) {
        let mut inner = self.inner.lock();
        inner.total_checks += 1;
        if !result.allowed {
            inner.blocked += 1;
        }

        for violation in &result.violations {
            *inner
                .by_type
                .entry(violation.violation_type.to_string())
                .or_insert(0) += 1;
            *inner
                .by_severity
                .entry(violation.severity.to_string())
                .or_insert(0) += 1;
            if let Some(pattern_id) = &violation.pattern_id {
                *inner.pattern_hits.entry(pattern_id.clone()).or_insert(0) += 1;
            }

            if inner.recent.len() >= RECENT_CAPACITY {
                inner.recent.pop_front();
            }
            inner.recent.push_back(ViolationRecord {
                timestamp: Utc::now(),
                violation_type: violation.violation_type.to_string(),
                severity: violation.severity.to_string(),
                description: violation.description.clone(),
                source: ctx.source.clone(),
            });
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();

        let mut top_patterns: Vec<PatternCount> = inner
            .pattern_hits
            .iter()
            .map(|(pattern_id, hits)| PatternCount {
                pattern_id: pattern_id.clone(),
                hits: *hits,
            })
            .collect();
        top_patterns.sort_by(|a, b| b.hits.cmp(&a.hits).then(a.pattern_id.cmp(&b.pattern_id)));
        top_patterns.truncate(TOP_PATTERNS);

        MetricsSnapshot {
            total_checks: inner.total_checks,
            blocked: inner.blocked,
            violations_by_type: inner.by_type.clone(),
            violations_by_severity: inner.by_severity.clone(),
            top_patterns,
            recent_violations: inner.recent.iter().cloned().collect(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = MetricsInner::default();
    }
}

//! Per-source fixed-window rate limiting and the explicit blocklist

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RateLimitConfig;

/// Counter state for one source address. Created lazily on first request.
#[derive(Debug, Clone)]
struct RateRecord {
    count: u32,
    window_started: Instant,
    blocked: bool,
    block_until: Option<Instant>,
}

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited,
}

/// Fixed-window counter table keyed by source address.
///
/// Each critical section is a few map operations, so one lock over the
/// table keeps per-key mutations atomic without sharding.
#[derive(Default)]
pub struct RateLimiter {
    records: RwLock<HashMap<String, RateRecord>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `source` against the configured window.
    pub fn check(&self, source: &str, config: &RateLimitConfig) -> RateDecision {
        let now = Instant::now();
        let window = Duration::from_secs(config.window_secs);
        let mut records = self.records.write();

        let record = records.entry(source.to_string()).or_insert(RateRecord {
            count: 0,
            window_started: now,
            blocked: false,
            block_until: None,
        });

        if record.blocked {
            match record.block_until {
                Some(until) if now < until => return RateDecision::Limited,
                _ => {
                    // Penalty elapsed, start clean.
                    record.blocked = false;
                    record.block_until = None;
                    record.count = 0;
                    record.window_started = now;
                }
            }
        }

        if now.duration_since(record.window_started) >= window {
            record.count = 0;
            record.window_started = now;
        }

        record.count += 1;
        if record.count > config.max_requests {
            record.blocked = true;
            record.block_until = Some(now + Duration::from_secs(config.penalty_secs));
            debug!(source, "rate limit exceeded, penalty applied");
            return RateDecision::Limited;
        }

        RateDecision::Allowed {
            remaining: config.max_requests - record.count,
        }
    }

    pub fn clear(&self, source: &str) {
        self.records.write().remove(source);
    }

    pub fn clear_all(&self) {
        self.records.write().clear();
    }

    pub fn tracked_sources(&self) -> usize {
        self.records.read().len()
    }
}

/// One explicitly blocked source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockedSource {
    pub address: String,
    pub reason: Option<String>,
    pub blocked_at: DateTime<Utc>,
}

/// Administratively blocked sources, independent of rate-limit penalties.
#[derive(Default)]
pub struct Blocklist {
    entries: RwLock<HashMap<String, BlockedSource>>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, address: &str, reason: Option<String>) {
        self.entries.write().insert(
            address.to_string(),
            BlockedSource {
                address: address.to_string(),
                reason,
                blocked_at: Utc::now(),
            },
        );
    }

    /// Returns whether the address was present.
    pub fn unblock(&self, address: &str) -> bool {
        self.entries.write().remove(address).is_some()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.read().contains_key(address)
    }

    pub fn list(&self) -> Vec<BlockedSource> {
        let mut entries: Vec<BlockedSource> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.address.cmp(&b.address));
        entries
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

//! Bounded inspection-event buffer and derived statistics

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{ActionTaken, InspectionEvent};

/// Most events retained; the oldest entry is evicted once full.
pub(crate) const EVENT_CAPACITY: usize = 10_000;

/// How many top sources the statistics report
const TOP_SOURCES: usize = 10;

/// A source address and how many of its requests were blocked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCount {
    pub address: String,
    pub blocked: u64,
}

/// Aggregate view over the event buffer, derived on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionStats {
    pub total_events: usize,
    pub blocked: u64,
    pub monitored: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
    pub top_sources: Vec<SourceCount>,
}

/// FIFO ring of inspection events. Length never exceeds the capacity.
pub struct EventBuffer {
    events: RwLock<VecDeque<InspectionEvent>>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, event: InspectionEvent) {
        let mut events = self.events.write();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Newest events first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<InspectionEvent> {
        self.events
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    pub fn stats(&self) -> InspectionStats {
        let events = self.events.read();

        let mut blocked = 0u64;
        let mut monitored = 0u64;
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_severity: BTreeMap<String, u64> = BTreeMap::new();
        let mut per_source: BTreeMap<&str, u64> = BTreeMap::new();

        for event in events.iter() {
            match event.action_taken {
                ActionTaken::Blocked => {
                    blocked += 1;
                    *per_source.entry(event.source.as_str()).or_insert(0) += 1;
                }
                ActionTaken::Monitored => monitored += 1,
            }
            *by_type.entry(event.event_type.to_string()).or_insert(0) += 1;
            *by_severity.entry(event.severity.to_string()).or_insert(0) += 1;
        }

        let mut top_sources: Vec<SourceCount> = per_source
            .into_iter()
            .map(|(address, count)| SourceCount {
                address: address.to_string(),
                blocked: count,
            })
            .collect();
        top_sources.sort_by(|a, b| b.blocked.cmp(&a.blocked).then(a.address.cmp(&b.address)));
        top_sources.truncate(TOP_SOURCES);

        InspectionStats {
            total_events: events.len(),
            blocked,
            monitored,
            by_type,
            by_severity,
            top_sources,
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

//! The orchestrating inspection engine
//!
//! One explicitly constructed [`WafEngine`] owns every piece of mutable
//! state (configuration, custom rules, rate-limit table, blocklist, event
//! buffer) and is shared by reference into request handlers. `reset()`
//! restores a pristine engine for test isolation.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use rampart_types::{AppError, AppResult};

use crate::catalog::RuleCatalog;
use crate::config::{EngineMode, WafConfig, WafConfigPatch};
use crate::events::{EventBuffer, InspectionStats};
use crate::rate_limit::{BlockedSource, Blocklist, RateDecision, RateLimiter};
use crate::request::InspectedRequest;
use crate::types::{
    ActionTaken, EventType, InspectionEvent, InspectionOutcome, Rule, RuleAction, ScanLocation,
    Severity,
};

/// Serializable view of a rule, without its compiled matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub locations: Vec<ScanLocation>,
    pub action: RuleAction,
    pub severity: Severity,
    pub enabled: bool,
}

impl From<&Rule> for RuleInfo {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            locations: rule.locations.clone(),
            action: rule.action,
            severity: rule.severity,
            enabled: rule.enabled,
        }
    }
}

/// Abstract response controller the hosting framework implements
pub trait Responder {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    fn write_json(&mut self, body: serde_json::Value);
}

pub struct WafEngine {
    config: RwLock<WafConfig>,
    defaults: WafConfig,
    catalog: RuleCatalog,
    custom_rules: RwLock<Vec<Rule>>,
    rate_limiter: RateLimiter,
    blocklist: Blocklist,
    events: EventBuffer,
}

impl WafEngine {
    /// Engine with the default configuration and the standard catalog.
    pub fn new() -> Self {
        // The default configuration is structurally valid.
        Self::with_config(WafConfig::default()).expect("default configuration validates")
    }

    /// Engine with a caller-supplied configuration. Fails fast on an
    /// invalid state.
    pub fn with_config(config: WafConfig) -> AppResult<Self> {
        config.validate()?;
        let catalog = RuleCatalog::standard();
        info!("Inspection engine ready, {} catalog rules", catalog.rule_count());
        Ok(Self {
            defaults: config.clone(),
            config: RwLock::new(config),
            catalog,
            custom_rules: RwLock::new(Vec::new()),
            rate_limiter: RateLimiter::new(),
            blocklist: Blocklist::new(),
            events: EventBuffer::new(),
        })
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Inspect one inbound request and decide whether it may proceed.
    pub fn inspect(&self, req: &InspectedRequest) -> InspectionOutcome {
        let config = self.config.read().clone();
        if !config.enabled {
            return InspectionOutcome::Allow { remaining: None };
        }

        let source = req.client_addr();
        let user_agent = req.user_agent().to_string();
        let monitor = config.mode == EngineMode::Monitor;

        // Whitelist bypasses everything, including rate limiting.
        if self.is_whitelisted(&config, req, &source, &user_agent) {
            return InspectionOutcome::Allow { remaining: None };
        }

        if let Some(reason) = self.blacklist_reason(&config, &source, &user_agent, req.country()) {
            self.record_decision(
                req,
                &source,
                EventType::Blacklist,
                "waf-blacklist",
                "Source blacklisted",
                Severity::High,
                String::new(),
                monitor,
                HashMap::from([("reason".to_string(), reason)]),
            );
            if !monitor {
                return InspectionOutcome::blocked();
            }
        }

        let remaining = match self.rate_limiter.check(&source, &config.rate_limit) {
            RateDecision::Limited => {
                self.record_decision(
                    req,
                    &source,
                    EventType::RateLimit,
                    "waf-rate-limit",
                    "Rate limit exceeded",
                    Severity::Medium,
                    String::new(),
                    monitor,
                    HashMap::from([
                        ("max_requests".to_string(), config.rate_limit.max_requests.to_string()),
                        ("window_secs".to_string(), config.rate_limit.window_secs.to_string()),
                    ]),
                );
                if !monitor {
                    return InspectionOutcome::rate_limited();
                }
                None
            }
            RateDecision::Allowed { remaining } => Some(remaining),
        };

        // Extracted location texts are shared across rules.
        let mut texts: HashMap<ScanLocation, String> = HashMap::new();
        let mut blocking_match = false;

        for (category, rules) in self.catalog.categories() {
            if !config.categories.enabled(*category) {
                continue;
            }
            blocking_match |= self.scan_rule_list(
                req,
                &source,
                rules,
                EventType::from(*category),
                monitor,
                &mut texts,
            );
        }

        {
            let custom = self.custom_rules.read();
            blocking_match |= self.scan_rule_list(
                req,
                &source,
                &custom,
                EventType::CustomRule,
                monitor,
                &mut texts,
            );
        }

        if blocking_match {
            return InspectionOutcome::blocked();
        }
        InspectionOutcome::Allow { remaining }
    }

    /// Middleware entry point: inspect, write the denial when needed, and
    /// signal whether the request may continue downstream.
    pub fn handle<R: Responder>(&self, req: &InspectedRequest, responder: &mut R) -> bool {
        match self.inspect(req) {
            InspectionOutcome::Allow { remaining } => {
                if let Some(remaining) = remaining {
                    responder.set_header("x-ratelimit-remaining", &remaining.to_string());
                }
                true
            }
            InspectionOutcome::Deny { status, code, message } => {
                responder.set_status(status);
                responder.set_header("content-type", "application/json");
                responder.write_json(json!({
                    "error": { "code": code, "message": message }
                }));
                false
            }
        }
    }

    /// Scan one ordered rule list. The first match terminates the list;
    /// later lists still run. Returns whether the match demands a block.
    fn scan_rule_list(
        &self,
        req: &InspectedRequest,
        source: &str,
        rules: &[Rule],
        event_type: EventType,
        monitor: bool,
        texts: &mut HashMap<ScanLocation, String>,
    ) -> bool {
        for rule in rules.iter().filter(|r| r.enabled) {
            for location in &rule.locations {
                let text = texts
                    .entry(*location)
                    .or_insert_with(|| req.location_text(*location));
                if !rule.matcher.is_match(text) {
                    continue;
                }
                let matched_value = rule.matcher.capture(text).unwrap_or_default();
                let blocks = !monitor && rule.action == RuleAction::Block;
                debug!(rule = %rule.id, %event_type, source, "rule matched");
                self.events.record(InspectionEvent {
                    timestamp: chrono::Utc::now(),
                    event_type,
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    severity: rule.severity,
                    source: source.to_string(),
                    method: req.method.clone(),
                    path: req.path.clone(),
                    user_agent: req.user_agent().to_string(),
                    matched_value,
                    action_taken: if blocks { ActionTaken::Blocked } else { ActionTaken::Monitored },
                    details: HashMap::new(),
                });
                return blocks;
            }
        }
        false
    }

    fn is_whitelisted(
        &self,
        config: &WafConfig,
        req: &InspectedRequest,
        source: &str,
        user_agent: &str,
    ) -> bool {
        config.whitelist.addresses.iter().any(|a| a == source)
            || config.whitelist.paths.iter().any(|p| req.path.starts_with(p.as_str()))
            || (!user_agent.is_empty()
                && config
                    .whitelist
                    .user_agents
                    .iter()
                    .any(|s| !s.is_empty() && user_agent.contains(s.as_str())))
    }

    fn blacklist_reason(
        &self,
        config: &WafConfig,
        source: &str,
        user_agent: &str,
        country: Option<&str>,
    ) -> Option<String> {
        if self.blocklist.contains(source) || config.blacklist.addresses.iter().any(|a| a == source)
        {
            return Some("address".to_string());
        }
        if !user_agent.is_empty()
            && config
                .blacklist
                .user_agents
                .iter()
                .any(|s| !s.is_empty() && user_agent.contains(s.as_str()))
        {
            return Some("user_agent".to_string());
        }
        if let Some(country) = country {
            if config
                .blacklist
                .countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country))
            {
                return Some("country".to_string());
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn record_decision(
        &self,
        req: &InspectedRequest,
        source: &str,
        event_type: EventType,
        rule_id: &str,
        rule_name: &str,
        severity: Severity,
        matched_value: String,
        monitor: bool,
        details: HashMap<String, String>,
    ) {
        self.events.record(InspectionEvent {
            timestamp: chrono::Utc::now(),
            event_type,
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            severity,
            source: source.to_string(),
            method: req.method.clone(),
            path: req.path.clone(),
            user_agent: req.user_agent().to_string(),
            matched_value,
            action_taken: if monitor { ActionTaken::Monitored } else { ActionTaken::Blocked },
            details,
        });
    }

    // ── Administrative surface ───────────────────────────────────────────

    pub fn get_config(&self) -> WafConfig {
        self.config.read().clone()
    }

    /// Apply a partial update. The patched configuration must validate or
    /// the running one is left untouched.
    pub fn update_config(&self, patch: WafConfigPatch) -> AppResult<WafConfig> {
        let mut updated = self.config.read().clone();
        updated.apply(patch);
        updated.validate()?;
        *self.config.write() = updated.clone();
        info!("Engine configuration updated");
        Ok(updated)
    }

    pub fn reset_config(&self) {
        *self.config.write() = self.defaults.clone();
    }

    pub fn block_source(&self, address: &str, reason: Option<String>) {
        info!(address, "source blocked");
        self.blocklist.block(address, reason);
    }

    pub fn unblock_source(&self, address: &str) -> bool {
        self.blocklist.unblock(address)
    }

    pub fn list_blocked_sources(&self) -> Vec<BlockedSource> {
        self.blocklist.list()
    }

    /// Admit a custom rule. The matcher type already proves pattern safety;
    /// this validates structure and id uniqueness.
    pub fn add_custom_rule(&self, rule: Rule) -> AppResult<()> {
        if rule.id.trim().is_empty() {
            return Err(AppError::Validation("rule id must not be empty".into()));
        }
        if rule.name.trim().is_empty() {
            return Err(AppError::Validation("rule name must not be empty".into()));
        }
        if rule.locations.is_empty() {
            return Err(AppError::Validation(
                "rule must apply to at least one location".into(),
            ));
        }
        if self.catalog.contains_id(&rule.id) {
            return Err(AppError::Validation(format!(
                "rule id '{}' collides with a catalog rule",
                rule.id
            )));
        }
        let mut custom = self.custom_rules.write();
        if custom.iter().any(|r| r.id == rule.id) {
            return Err(AppError::Validation(format!(
                "rule id '{}' already exists",
                rule.id
            )));
        }
        info!(rule = %rule.id, "custom rule admitted");
        custom.push(rule);
        Ok(())
    }

    /// Returns whether a rule with that id was present.
    pub fn remove_custom_rule(&self, id: &str) -> bool {
        let mut custom = self.custom_rules.write();
        let before = custom.len();
        custom.retain(|r| r.id != id);
        let removed = custom.len() != before;
        if !removed {
            warn!(rule = id, "remove requested for unknown custom rule");
        }
        removed
    }

    pub fn list_custom_rules(&self) -> Vec<RuleInfo> {
        self.custom_rules.read().iter().map(RuleInfo::from).collect()
    }

    pub fn get_events(&self, limit: usize) -> Vec<InspectionEvent> {
        self.events.recent(limit)
    }

    pub fn get_stats(&self) -> InspectionStats {
        self.events.stats()
    }

    pub fn clear_rate_limit(&self, address: &str) {
        self.rate_limiter.clear(address);
    }

    pub fn clear_all_rate_limits(&self) {
        self.rate_limiter.clear_all();
    }

    /// Restore the engine to its just-constructed state.
    pub fn reset(&self) {
        *self.config.write() = self.defaults.clone();
        self.custom_rules.write().clear();
        self.rate_limiter.clear_all();
        self.blocklist.clear();
        self.events.clear();
    }
}

impl Default for WafEngine {
    fn default() -> Self {
        Self::new()
    }
}

//! Type definitions for the inspection engine

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::SafeMatcher;

/// Attack class a detection rule addresses.
///
/// Declaration order is the evaluation order across categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    SqlInjection,
    Xss,
    CommandInjection,
    PathTraversal,
    ProtocolAttack,
    BotSignature,
}

impl AttackCategory {
    /// All categories in evaluation order.
    pub const ALL: [AttackCategory; 6] = [
        Self::SqlInjection,
        Self::Xss,
        Self::CommandInjection,
        Self::PathTraversal,
        Self::ProtocolAttack,
        Self::BotSignature,
    ];
}

impl std::fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SqlInjection => write!(f, "SQL_INJECTION"),
            Self::Xss => write!(f, "XSS"),
            Self::CommandInjection => write!(f, "COMMAND_INJECTION"),
            Self::PathTraversal => write!(f, "PATH_TRAVERSAL"),
            Self::ProtocolAttack => write!(f, "PROTOCOL_ATTACK"),
            Self::BotSignature => write!(f, "BOT_SIGNATURE"),
        }
    }
}

/// Severity level of a detection
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

/// What the engine does when a rule matches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Allow,
    LogOnly,
}

/// Request location a rule applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanLocation {
    Body,
    Query,
    Path,
    Headers,
}

/// A single detection rule.
///
/// The pattern is held as an already-compiled [`SafeMatcher`], never as a
/// raw string; admission safety is proven at construction time.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub matcher: SafeMatcher,
    pub locations: Vec<ScanLocation>,
    pub action: RuleAction,
    pub severity: Severity,
    pub enabled: bool,
}

/// Event type tag recorded with each inspection event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SqlInjection,
    Xss,
    CommandInjection,
    PathTraversal,
    ProtocolAttack,
    BotSignature,
    Blacklist,
    RateLimit,
    CustomRule,
}

impl From<AttackCategory> for EventType {
    fn from(category: AttackCategory) -> Self {
        match category {
            AttackCategory::SqlInjection => Self::SqlInjection,
            AttackCategory::Xss => Self::Xss,
            AttackCategory::CommandInjection => Self::CommandInjection,
            AttackCategory::PathTraversal => Self::PathTraversal,
            AttackCategory::ProtocolAttack => Self::ProtocolAttack,
            AttackCategory::BotSignature => Self::BotSignature,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SqlInjection => write!(f, "SQL_INJECTION"),
            Self::Xss => write!(f, "XSS"),
            Self::CommandInjection => write!(f, "COMMAND_INJECTION"),
            Self::PathTraversal => write!(f, "PATH_TRAVERSAL"),
            Self::ProtocolAttack => write!(f, "PROTOCOL_ATTACK"),
            Self::BotSignature => write!(f, "BOT_SIGNATURE"),
            Self::Blacklist => write!(f, "BLACKLIST"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::CustomRule => write!(f, "CUSTOM_RULE"),
        }
    }
}

/// Whether a detection actually halted the request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Blocked,
    Monitored,
}

/// One recorded inspection decision. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub source: String,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    /// Matched substring, truncated to at most 100 characters
    pub matched_value: String,
    pub action_taken: ActionTaken,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

/// Machine-readable denial code for blocked rule matches
pub const CODE_WAF_BLOCKED: &str = "WAF_BLOCKED";
/// Machine-readable denial code for rate-limited sources
pub const CODE_RATE_LIMITED: &str = "RATE_LIMITED";

/// Outcome of inspecting one request.
///
/// Denials carry only a generic message and a machine-readable code,
/// never rule internals.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InspectionOutcome {
    Allow {
        /// Requests left in the current rate-limit window, when counted
        remaining: Option<u32>,
    },
    Deny {
        status: u16,
        code: &'static str,
        message: String,
    },
}

impl InspectionOutcome {
    pub fn allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub(crate) fn blocked() -> Self {
        Self::Deny {
            status: 403,
            code: CODE_WAF_BLOCKED,
            message: "Request blocked by security policy".to_string(),
        }
    }

    pub(crate) fn rate_limited() -> Self {
        Self::Deny {
            status: 429,
            code: CODE_RATE_LIMITED,
            message: "Too many requests, please retry later".to_string(),
        }
    }
}

//! Rampart WAF: rule-based request inspection
//!
//! A process-local inspection layer sitting in front of a web application:
//! categorized attack-detection rules, a per-source fixed-window rate
//! limiter with an explicit blocklist, and a bounded event log with derived
//! statistics.
//!
//! # Architecture
//!
//! - **Engine**: [`WafEngine`] owns all mutable state and decides
//!   allow/deny per request
//! - **Catalog**: static, ordered rule lists per attack category
//! - **Matcher**: [`SafeMatcher`], the only pattern type evaluated, with
//!   admission safety checks for dynamically supplied rules
//! - **Events**: bounded FIFO buffer, statistics derived on demand
//!
//! # Usage
//!
//! ```rust
//! use rampart_waf::{InspectedRequest, WafEngine};
//!
//! let engine = WafEngine::new();
//! let req = InspectedRequest::new("POST", "/login")
//!     .with_peer_addr("203.0.113.7")
//!     .with_body(serde_json::json!({"username": "1' OR '1'='1"}));
//!
//! let outcome = engine.inspect(&req);
//! assert!(!outcome.allowed());
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod events;
pub mod matcher;
pub mod rate_limit;
pub mod request;
pub mod types;

pub use catalog::RuleCatalog;
pub use config::{
    BlacklistConfig, CategoryToggles, EngineMode, RateLimitConfig, WafConfig, WafConfigPatch,
    WhitelistConfig,
};
pub use engine::{Responder, RuleInfo, WafEngine};
pub use events::{InspectionStats, SourceCount};
pub use matcher::SafeMatcher;
pub use rate_limit::BlockedSource;
pub use request::InspectedRequest;
pub use types::*;

#[cfg(test)]
mod integration_tests;

//! Engine configuration: mode, category toggles, lists, rate-limit knobs

use serde::{Deserialize, Serialize};

use rampart_types::{AppError, AppResult};

use crate::types::AttackCategory;

/// Enforcement mode. `Monitor` runs identical detection but never halts a
/// request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Block,
    Monitor,
}

/// Per-category enable flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryToggles {
    pub sql_injection: bool,
    pub xss: bool,
    pub command_injection: bool,
    pub path_traversal: bool,
    pub protocol_attack: bool,
    pub bot_signature: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            sql_injection: true,
            xss: true,
            command_injection: true,
            path_traversal: true,
            protocol_attack: true,
            bot_signature: true,
        }
    }
}

impl CategoryToggles {
    pub fn enabled(&self, category: AttackCategory) -> bool {
        match category {
            AttackCategory::SqlInjection => self.sql_injection,
            AttackCategory::Xss => self.xss,
            AttackCategory::CommandInjection => self.command_injection,
            AttackCategory::PathTraversal => self.path_traversal,
            AttackCategory::ProtocolAttack => self.protocol_attack,
            AttackCategory::BotSignature => self.bot_signature,
        }
    }
}

/// Sources exempt from every check. Addresses match exactly, paths by
/// prefix, user agents by substring.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhitelistConfig {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub user_agents: Vec<String>,
}

/// Sources denied outright. Addresses match exactly, user agents by
/// substring, countries against the upstream geo header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlacklistConfig {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
}

/// Fixed-window rate-limit parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    pub penalty_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 100,
            penalty_secs: 300,
        }
    }
}

/// Process-wide engine configuration. One instance, replaced wholesale or
/// patched field-by-field through the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WafConfig {
    pub enabled: bool,
    pub mode: EngineMode,
    #[serde(default)]
    pub categories: CategoryToggles,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for WafConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: EngineMode::Block,
            categories: CategoryToggles::default(),
            whitelist: WhitelistConfig::default(),
            blacklist: BlacklistConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl WafConfig {
    /// Fail-fast structural validation, run at engine construction and on
    /// every update.
    pub fn validate(&self) -> AppResult<()> {
        if self.rate_limit.window_secs == 0 {
            return Err(AppError::Config("rate-limit window must be non-zero".into()));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(AppError::Config("rate-limit maximum must be non-zero".into()));
        }
        if self.rate_limit.penalty_secs == 0 {
            return Err(AppError::Config("rate-limit penalty must be non-zero".into()));
        }
        Ok(())
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: WafConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        if let Some(whitelist) = patch.whitelist {
            self.whitelist = whitelist;
        }
        if let Some(blacklist) = patch.blacklist {
            self.blacklist = blacklist;
        }
        if let Some(rate_limit) = patch.rate_limit {
            self.rate_limit = rate_limit;
        }
    }
}

/// Field-by-field configuration patch for the admin surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WafConfigPatch {
    pub enabled: Option<bool>,
    pub mode: Option<EngineMode>,
    pub categories: Option<CategoryToggles>,
    pub whitelist: Option<WhitelistConfig>,
    pub blacklist: Option<BlacklistConfig>,
    pub rate_limit: Option<RateLimitConfig>,
}

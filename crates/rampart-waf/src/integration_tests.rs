//! End-to-end engine scenarios

use serde_json::json;

use crate::config::{EngineMode, RateLimitConfig, WafConfig, WafConfigPatch};
use crate::engine::{Responder, WafEngine};
use crate::matcher::SafeMatcher;
use crate::request::InspectedRequest;
use crate::types::{
    ActionTaken, EventType, InspectionOutcome, Rule, RuleAction, ScanLocation, Severity,
    CODE_RATE_LIMITED, CODE_WAF_BLOCKED,
};

fn sqli_request(addr: &str) -> InspectedRequest {
    InspectedRequest::new("POST", "/login")
        .with_peer_addr(addr)
        .with_body(json!({"username": "1' OR '1'='1", "password": "x"}))
}

fn clean_request(addr: &str) -> InspectedRequest {
    InspectedRequest::new("GET", "/products")
        .with_peer_addr(addr)
        .with_query(json!({"sort": "price"}))
}

fn custom_rule(id: &str, pattern: &str) -> Rule {
    Rule {
        id: id.to_string(),
        name: "Custom".to_string(),
        description: String::new(),
        matcher: SafeMatcher::checked(pattern).expect("pattern admitted"),
        locations: vec![ScanLocation::Body],
        action: RuleAction::Block,
        severity: Severity::High,
        enabled: true,
    }
}

#[test]
fn test_sql_injection_blocked_with_one_event() {
    let engine = WafEngine::new();
    let outcome = engine.inspect(&sqli_request("203.0.113.7"));

    match outcome {
        InspectionOutcome::Deny { status, code, .. } => {
            assert_eq!(status, 403);
            assert_eq!(code, CODE_WAF_BLOCKED);
        }
        InspectionOutcome::Allow { .. } => panic!("expected deny"),
    }

    let events = engine.get_events(10);
    let sqli: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::SqlInjection)
        .collect();
    assert_eq!(sqli.len(), 1, "exactly one SQL injection event");
    assert_eq!(sqli[0].action_taken, ActionTaken::Blocked);
    assert_eq!(sqli[0].source, "203.0.113.7");
    assert!(sqli[0].matched_value.chars().count() <= 100);
}

#[test]
fn test_disabled_category_allows_payload() {
    let engine = WafEngine::new();
    let mut config = engine.get_config();
    config.categories.sql_injection = false;
    engine
        .update_config(WafConfigPatch {
            categories: Some(config.categories),
            ..Default::default()
        })
        .expect("patch applies");

    let outcome = engine.inspect(&sqli_request("203.0.113.7"));
    assert!(outcome.allowed());
    assert!(engine
        .get_events(10)
        .iter()
        .all(|e| e.event_type != EventType::SqlInjection));
}

#[test]
fn test_monitor_mode_records_but_allows() {
    let engine = WafEngine::new();
    engine
        .update_config(WafConfigPatch {
            mode: Some(EngineMode::Monitor),
            ..Default::default()
        })
        .expect("patch applies");

    let outcome = engine.inspect(&sqli_request("203.0.113.7"));
    assert!(outcome.allowed());

    let events = engine.get_events(10);
    let event = events
        .iter()
        .find(|e| e.event_type == EventType::SqlInjection)
        .expect("detection still recorded");
    assert_eq!(event.action_taken, ActionTaken::Monitored);
}

#[test]
fn test_rate_limit_window_and_clear() {
    let config = WafConfig {
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: 3,
            penalty_secs: 300,
        },
        ..Default::default()
    };
    let engine = WafEngine::with_config(config).expect("config validates");

    for _ in 0..3 {
        assert!(engine.inspect(&clean_request("198.51.100.9")).allowed());
    }
    match engine.inspect(&clean_request("198.51.100.9")) {
        InspectionOutcome::Deny { status, code, .. } => {
            assert_eq!(status, 429);
            assert_eq!(code, CODE_RATE_LIMITED);
        }
        InspectionOutcome::Allow { .. } => panic!("fourth request should be limited"),
    }
    assert!(engine
        .get_events(10)
        .iter()
        .any(|e| e.event_type == EventType::RateLimit));

    engine.clear_rate_limit("198.51.100.9");
    assert!(engine.inspect(&clean_request("198.51.100.9")).allowed());
}

#[test]
fn test_whitelisted_address_bypasses_everything() {
    let config = WafConfig {
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: 1,
            penalty_secs: 300,
        },
        ..Default::default()
    };
    let engine = WafEngine::with_config(config).expect("config validates");
    engine
        .update_config(WafConfigPatch {
            whitelist: Some(crate::config::WhitelistConfig {
                addresses: vec!["203.0.113.7".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .expect("patch applies");

    // Attack payload, repeated past the rate limit: still allowed.
    for _ in 0..5 {
        assert!(engine.inspect(&sqli_request("203.0.113.7")).allowed());
    }
    assert!(engine.get_events(10).is_empty());
}

#[test]
fn test_whitelisted_path_prefix() {
    let engine = WafEngine::new();
    engine
        .update_config(WafConfigPatch {
            whitelist: Some(crate::config::WhitelistConfig {
                paths: vec!["/health".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .expect("patch applies");

    let req = InspectedRequest::new("GET", "/health/deep")
        .with_peer_addr("203.0.113.7")
        .with_body(json!({"q": "1' OR '1'='1"}));
    assert!(engine.inspect(&req).allowed());
}

#[test]
fn test_blocked_source_denied_and_listed() {
    let engine = WafEngine::new();
    engine.block_source("192.0.2.1", Some("manual".to_string()));

    let outcome = engine.inspect(&clean_request("192.0.2.1"));
    assert!(!outcome.allowed());

    let listed = engine.list_blocked_sources();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].address, "192.0.2.1");

    assert!(engine.unblock_source("192.0.2.1"));
    assert!(engine.inspect(&clean_request("192.0.2.1")).allowed());
}

#[test]
fn test_forwarded_address_used_for_limiting() {
    let config = WafConfig {
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: 1,
            penalty_secs: 300,
        },
        ..Default::default()
    };
    let engine = WafEngine::with_config(config).expect("config validates");

    let req = clean_request("10.0.0.1").with_header("x-forwarded-for", "203.0.113.50, 10.0.0.1");
    assert!(engine.inspect(&req).allowed());
    assert!(!engine.inspect(&req).allowed());

    // A different forwarded client behind the same peer is unaffected.
    let other = clean_request("10.0.0.1").with_header("x-forwarded-for", "203.0.113.51");
    assert!(engine.inspect(&other).allowed());
}

#[test]
fn test_custom_rule_lifecycle() {
    let engine = WafEngine::new();
    engine
        .add_custom_rule(custom_rule("tenant-001", r"(?i)forbidden-token"))
        .expect("rule admitted");

    let req = InspectedRequest::new("POST", "/api")
        .with_peer_addr("203.0.113.7")
        .with_body(json!({"data": "carries a Forbidden-Token inside"}));
    assert!(!engine.inspect(&req).allowed());
    assert!(engine
        .get_events(10)
        .iter()
        .any(|e| e.event_type == EventType::CustomRule && e.rule_id == "tenant-001"));

    assert!(engine.remove_custom_rule("tenant-001"));
    assert!(engine.inspect(&req).allowed());
}

#[test]
fn test_custom_rule_duplicate_id_rejected() {
    let engine = WafEngine::new();
    engine
        .add_custom_rule(custom_rule("tenant-001", "alpha"))
        .expect("first admitted");
    assert!(engine.add_custom_rule(custom_rule("tenant-001", "beta")).is_err());
    assert_eq!(engine.list_custom_rules().len(), 1);
}

#[test]
fn test_custom_rule_unsafe_pattern_never_admitted() {
    // "(a+)+" must fail at matcher construction, before any rule exists.
    assert!(SafeMatcher::checked("(a+)+").is_err());

    let engine = WafEngine::new();
    assert!(engine.list_custom_rules().is_empty());
}

#[test]
fn test_bot_logonly_rule_records_without_blocking() {
    let engine = WafEngine::new();
    let req = clean_request("203.0.113.7").with_header("user-agent", "python-requests/2.31");

    assert!(engine.inspect(&req).allowed());
    let events = engine.get_events(10);
    let event = events
        .iter()
        .find(|e| e.event_type == EventType::BotSignature)
        .expect("log-only rule recorded");
    assert_eq!(event.action_taken, ActionTaken::Monitored);
}

#[test]
fn test_multiple_categories_trigger_multiple_events() {
    let engine = WafEngine::new();
    let req = InspectedRequest::new("POST", "/api")
        .with_peer_addr("203.0.113.7")
        .with_body(json!({
            "a": "x UNION SELECT secret",
            "b": "<script>alert(1)</script>"
        }));

    assert!(!engine.inspect(&req).allowed());
    let events = engine.get_events(10);
    assert!(events.iter().any(|e| e.event_type == EventType::SqlInjection));
    assert!(events.iter().any(|e| e.event_type == EventType::Xss));
}

#[test]
fn test_stats_reflect_decisions() {
    let engine = WafEngine::new();
    engine.inspect(&sqli_request("203.0.113.7"));
    engine.inspect(&sqli_request("203.0.113.7"));
    engine.inspect(&sqli_request("198.51.100.1"));

    let stats = engine.get_stats();
    assert_eq!(stats.blocked, 3);
    assert_eq!(stats.top_sources[0].address, "203.0.113.7");
    assert_eq!(stats.top_sources[0].blocked, 2);
    assert_eq!(stats.by_type.get("SQL_INJECTION"), Some(&3));
}

#[test]
fn test_disabled_engine_allows_everything() {
    let engine = WafEngine::new();
    engine
        .update_config(WafConfigPatch {
            enabled: Some(false),
            ..Default::default()
        })
        .expect("patch applies");
    assert!(engine.inspect(&sqli_request("203.0.113.7")).allowed());
    assert!(engine.get_events(10).is_empty());
}

#[test]
fn test_reset_restores_pristine_state() {
    let engine = WafEngine::new();
    engine.block_source("192.0.2.1", None);
    engine
        .add_custom_rule(custom_rule("tenant-001", "alpha"))
        .expect("rule admitted");
    engine.inspect(&sqli_request("203.0.113.7"));
    engine
        .update_config(WafConfigPatch {
            mode: Some(EngineMode::Monitor),
            ..Default::default()
        })
        .expect("patch applies");

    engine.reset();

    assert_eq!(engine.get_config().mode, EngineMode::Block);
    assert!(engine.list_blocked_sources().is_empty());
    assert!(engine.list_custom_rules().is_empty());
    assert!(engine.get_events(10).is_empty());
}

#[derive(Default)]
struct RecordingResponder {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl Responder for RecordingResponder {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
    fn write_json(&mut self, body: serde_json::Value) {
        self.body = Some(body);
    }
}

#[test]
fn test_handle_writes_generic_denial() {
    let engine = WafEngine::new();
    let mut responder = RecordingResponder::default();

    let proceed = engine.handle(&sqli_request("203.0.113.7"), &mut responder);
    assert!(!proceed);
    assert_eq!(responder.status, Some(403));

    let body = responder.body.expect("denial body written");
    assert_eq!(body["error"]["code"], "WAF_BLOCKED");
    // No rule internals leak into the response.
    let rendered = body.to_string();
    assert!(!rendered.contains("waf-sqli"));
    assert!(!rendered.to_lowercase().contains("union"));
}

#[test]
fn test_handle_allows_and_reports_quota() {
    let engine = WafEngine::new();
    let mut responder = RecordingResponder::default();

    let proceed = engine.handle(&clean_request("203.0.113.7"), &mut responder);
    assert!(proceed);
    assert!(responder
        .headers
        .iter()
        .any(|(name, _)| name == "x-ratelimit-remaining"));
    assert!(responder.status.is_none());
}

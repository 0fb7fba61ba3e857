//! Static detection-rule catalog, grouped by attack category
//!
//! Conservative, high-confidence patterns. Within a category, order
//! matters: the first matching rule settles that category for a request.

use crate::matcher::SafeMatcher;
use crate::types::{AttackCategory, Rule, RuleAction, ScanLocation, Severity};

/// Ordered rule lists for every attack category.
pub struct RuleCatalog {
    categories: Vec<(AttackCategory, Vec<Rule>)>,
}

impl RuleCatalog {
    /// Build the standard catalog, categories in evaluation order.
    pub fn standard() -> Self {
        Self {
            categories: vec![
                (AttackCategory::SqlInjection, sql_injection_rules()),
                (AttackCategory::Xss, xss_rules()),
                (AttackCategory::CommandInjection, command_injection_rules()),
                (AttackCategory::PathTraversal, path_traversal_rules()),
                (AttackCategory::ProtocolAttack, protocol_attack_rules()),
                (AttackCategory::BotSignature, bot_signature_rules()),
            ],
        }
    }

    pub fn categories(&self) -> &[(AttackCategory, Vec<Rule>)] {
        &self.categories
    }

    pub fn rule_count(&self) -> usize {
        self.categories.iter().map(|(_, rules)| rules.len()).sum()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.categories
            .iter()
            .any(|(_, rules)| rules.iter().any(|r| r.id == id))
    }
}

fn rule(
    id: &str,
    name: &str,
    severity: Severity,
    action: RuleAction,
    pattern: &str,
    locations: &[ScanLocation],
    description: &str,
) -> Option<Rule> {
    SafeMatcher::builtin(pattern).map(|matcher| Rule {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        matcher,
        locations: locations.to_vec(),
        action,
        severity,
        enabled: true,
    })
}

const BQP: &[ScanLocation] = &[ScanLocation::Body, ScanLocation::Query, ScanLocation::Path];
const BQ: &[ScanLocation] = &[ScanLocation::Body, ScanLocation::Query];
const HDRS: &[ScanLocation] = &[ScanLocation::Headers];

fn sql_injection_rules() -> Vec<Rule> {
    [
        rule(
            "waf-sqli-001",
            "SQLi: UNION SELECT",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)\bunion\s+(all\s+)?select\b",
            BQP,
            "UNION-based SQL injection",
        ),
        rule(
            "waf-sqli-002",
            "SQLi: Tautology",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)'\s*or\s+[^=]{0,40}=|\bor\s+1\s*=\s*1\b",
            BQP,
            "Always-true predicate such as ' OR '1'='1",
        ),
        rule(
            "waf-sqli-003",
            "SQLi: Stacked destructive query",
            Severity::Critical,
            RuleAction::Block,
            r"(?i);\s*(drop|alter|truncate|delete|insert|update|create)\s",
            BQP,
            "Stacked query attempting a write",
        ),
        rule(
            "waf-sqli-004",
            "SQLi: DROP statement",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)\bdrop\s+(table|database|index)\b",
            BQP,
            "Destructive DROP statement",
        ),
        rule(
            "waf-sqli-005",
            "SQLi: Time-based blind",
            Severity::High,
            RuleAction::Block,
            r"(?i)\b(sleep|benchmark|pg_sleep)\s*\(|\bwaitfor\s+delay\b",
            BQP,
            "Time-delay probing",
        ),
        rule(
            "waf-sqli-006",
            "SQLi: System table access",
            Severity::High,
            RuleAction::Block,
            r"(?i)\b(information_schema|pg_catalog|mysql\.user|sysobjects)\b",
            BQP,
            "Schema enumeration",
        ),
        rule(
            "waf-sqli-007",
            "SQLi: Comment evasion",
            Severity::Medium,
            RuleAction::Block,
            r"(?i)/\*.{0,40}\*/\s*(union|select|or|and)\b",
            BQP,
            "Inline comments splitting keywords",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn xss_rules() -> Vec<Rule> {
    [
        rule(
            "waf-xss-001",
            "XSS: Script tag",
            Severity::High,
            RuleAction::Block,
            r"(?i)<\s*script[\s>]",
            BQ,
            "Inline script tag injection",
        ),
        rule(
            "waf-xss-002",
            "XSS: Event handler",
            Severity::High,
            RuleAction::Block,
            r"(?i)\bon(error|load|click|mouseover|focus|blur|submit)\s*=",
            BQ,
            "DOM event handler injection",
        ),
        rule(
            "waf-xss-003",
            "XSS: javascript URI",
            Severity::High,
            RuleAction::Block,
            r"(?i)javascript\s*:",
            BQP,
            "javascript: scheme in an attribute value",
        ),
        rule(
            "waf-xss-004",
            "XSS: Active element",
            Severity::High,
            RuleAction::Block,
            r"(?i)<\s*(iframe|svg|embed|object)\b",
            BQ,
            "Embeddable active element injection",
        ),
        rule(
            "waf-xss-005",
            "XSS: Document access",
            Severity::Medium,
            RuleAction::Block,
            r"(?i)document\s*\.\s*(cookie|write|location)",
            BQ,
            "Script probing the document object",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn command_injection_rules() -> Vec<Rule> {
    [
        rule(
            "waf-cmdi-001",
            "CMDi: Subshell",
            Severity::Critical,
            RuleAction::Block,
            r"\$\(|`[^`]{1,80}`",
            BQP,
            "Subshell or backtick execution",
        ),
        rule(
            "waf-cmdi-002",
            "CMDi: Command chaining",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)[;|&]\s*(cat|ls|rm|wget|curl|nc|bash|sh|python|perl)\b",
            BQP,
            "Shell metacharacter followed by a common binary",
        ),
        rule(
            "waf-cmdi-003",
            "CMDi: Exec function",
            Severity::High,
            RuleAction::Block,
            r"(?i)\b(system|exec|passthru|shell_exec|popen)\s*\(",
            BQ,
            "Interpreter exec-family call",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn path_traversal_rules() -> Vec<Rule> {
    [
        rule(
            "waf-trav-001",
            "Traversal: Dot-dot run",
            Severity::High,
            RuleAction::Block,
            r"(?:\.\./|\.\.\\){2,}",
            BQP,
            "Repeated parent-directory escapes",
        ),
        rule(
            "waf-trav-002",
            "Traversal: Encoded dot-dot",
            Severity::High,
            RuleAction::Block,
            r"(?i)%2e%2e(%2f|%5c)|%252e",
            BQP,
            "Percent-encoded traversal",
        ),
        rule(
            "waf-trav-003",
            "Traversal: Sensitive file",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)/(etc/(passwd|shadow|hosts)|proc/self|windows/system32)",
            BQP,
            "Well-known sensitive file path",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn protocol_attack_rules() -> Vec<Rule> {
    [
        rule(
            "waf-proto-001",
            "Protocol: CRLF injection",
            Severity::High,
            RuleAction::Block,
            r"(?i)%0d%0a|%0a%0d|\r",
            &[ScanLocation::Path, ScanLocation::Query],
            "CRLF sequences splitting the response",
        ),
        rule(
            "waf-proto-002",
            "Protocol: Request smuggling",
            Severity::Critical,
            RuleAction::Block,
            r"(?i)content-length[\s\S]{0,200}transfer-encoding\s*:\s*chunked|transfer-encoding\s*:\s*chunked[\s\S]{0,200}content-length",
            HDRS,
            "Conflicting framing headers",
        ),
        rule(
            "waf-proto-003",
            "Protocol: Dangerous scheme",
            Severity::High,
            RuleAction::Block,
            r"(?i)\b(gopher|dict|ldap|tftp)://",
            BQP,
            "Non-HTTP scheme smuggled into a parameter",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn bot_signature_rules() -> Vec<Rule> {
    [
        rule(
            "waf-bot-001",
            "Bot: Attack scanner",
            Severity::High,
            RuleAction::Block,
            r"(?i)(sqlmap|nikto|nessus|nmap|masscan|acunetix|wpscan|dirbuster|gobuster)",
            HDRS,
            "Known vulnerability-scanner user agent",
        ),
        rule(
            "waf-bot-002",
            "Bot: Headless browser",
            Severity::Medium,
            RuleAction::Block,
            r"(?i)(headlesschrome|phantomjs|selenium|puppeteer|playwright)",
            HDRS,
            "Automated browser user agent",
        ),
        rule(
            "waf-bot-003",
            "Bot: Generic HTTP client",
            Severity::Low,
            RuleAction::LogOnly,
            r"(?i)(python-requests|go-http-client|java/\d|libwww-perl)",
            HDRS,
            "Library user agent, recorded but not blocked",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_all_categories_in_order() {
        let catalog = RuleCatalog::standard();
        let order: Vec<AttackCategory> =
            catalog.categories().iter().map(|(c, _)| *c).collect();
        assert_eq!(order, AttackCategory::ALL.to_vec());
        for (category, rules) in catalog.categories() {
            assert!(!rules.is_empty(), "empty category {category}");
        }
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let catalog = RuleCatalog::standard();
        let mut seen = std::collections::HashSet::new();
        for (_, rules) in catalog.categories() {
            for rule in rules {
                assert!(seen.insert(rule.id.clone()), "duplicate rule id {}", rule.id);
            }
        }
    }

    #[test]
    fn test_sql_injection_detection() {
        let rules = sql_injection_rules();
        for payload in [
            "1' OR '1'='1",
            "x UNION SELECT password FROM users",
            "1; DROP TABLE users",
            "id=1 OR 1=1",
        ] {
            assert!(
                rules.iter().any(|r| r.matcher.is_match(payload)),
                "expected SQLi match for {payload:?}"
            );
        }
    }

    #[test]
    fn test_xss_detection() {
        let rules = xss_rules();
        assert!(rules.iter().any(|r| r.matcher.is_match("<script>alert(1)</script>")));
        assert!(rules.iter().any(|r| r.matcher.is_match("<img onerror=steal()>")));
    }

    #[test]
    fn test_command_injection_detection() {
        let rules = command_injection_rules();
        assert!(rules.iter().any(|r| r.matcher.is_match("$(rm -rf /)")));
        assert!(rules.iter().any(|r| r.matcher.is_match("x; cat /etc/passwd")));
    }

    #[test]
    fn test_path_traversal_detection() {
        let rules = path_traversal_rules();
        assert!(rules.iter().any(|r| r.matcher.is_match("../../../../etc/passwd")));
        assert!(rules.iter().any(|r| r.matcher.is_match("%2e%2e%2fconfig")));
    }

    #[test]
    fn test_bot_detection_and_logonly_tier() {
        let rules = bot_signature_rules();
        assert!(rules.iter().any(|r| r.matcher.is_match("user-agent: sqlmap/1.7")));
        let generic = rules.iter().find(|r| r.id == "waf-bot-003").expect("rule present");
        assert_eq!(generic.action, RuleAction::LogOnly);
        assert!(generic.matcher.is_match("user-agent: python-requests/2.31"));
    }

    #[test]
    fn test_no_false_positives_on_normal_payloads() {
        let catalog = RuleCatalog::standard();
        for payload in [
            "please summarize chapter 4",
            r#"{"name":"Jane","note":"ordering 2 items"}"#,
            "/products/42?sort=price",
        ] {
            for (category, rules) in catalog.categories() {
                assert!(
                    !rules.iter().any(|r| r.matcher.is_match(payload)),
                    "false positive in {category} for {payload:?}"
                );
            }
        }
    }
}

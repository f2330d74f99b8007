//! Path-pattern routing and rewriting for proxied requests.
//!
//! The route table is built once at startup from the ordered rule list in the
//! configuration and is immutable for the process lifetime. Matching is
//! first-match-wins over the declared order; each rule pairs a regex path
//! pattern with a rewrite template using named capture groups, e.g.
//! `/bank/accounts/(?<segment>.*)` rewritten to `/${segment}`.
use regex::Regex;

use crate::config::models::RouteRuleConfig;

/// One compiled routing rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: Regex,
    rewrite: String,
    service: String,
}

/// Result of a successful route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Logical name of the target service, resolved to an address elsewhere.
    pub service: &'a str,
    /// Path to use on the upstream request.
    pub rewritten_path: String,
}

/// Ordered, immutable routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile the configured rules. Patterns are anchored to match the whole
    /// request path.
    pub fn from_config(rules: &[RouteRuleConfig]) -> Result<Self, String> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let anchored = format!("^{}$", rule.pattern.trim_start_matches('^').trim_end_matches('$'));
            let pattern = Regex::new(&anchored)
                .map_err(|e| format!("invalid route pattern '{}': {e}", rule.pattern))?;
            compiled.push(RouteRule {
                pattern,
                rewrite: rule.rewrite.clone(),
                service: rule.service.clone(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Find the first rule matching `path` and apply its rewrite.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        for rule in &self.rules {
            if rule.pattern.is_match(path) {
                let rewritten_path = rule
                    .pattern
                    .replace(path, rule.rewrite.as_str())
                    .into_owned();
                return Some(RouteMatch {
                    service: &rule.service,
                    rewritten_path,
                });
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_rules() -> Vec<RouteRuleConfig> {
        vec![
            RouteRuleConfig {
                pattern: "/bank/accounts/(?<segment>.*)".to_string(),
                rewrite: "/${segment}".to_string(),
                service: "ACCOUNTS".to_string(),
            },
            RouteRuleConfig {
                pattern: "/bank/loans/(?<segment>.*)".to_string(),
                rewrite: "/${segment}".to_string(),
                service: "LOANS".to_string(),
            },
            RouteRuleConfig {
                pattern: "/bank/cards/(?<segment>.*)".to_string(),
                rewrite: "/${segment}".to_string(),
                service: "CARDS".to_string(),
            },
        ]
    }

    #[test]
    fn rewrites_accounts_path() {
        let table = RouteTable::from_config(&bank_rules()).unwrap();
        let m = table.resolve("/bank/accounts/123").unwrap();
        assert_eq!(m.service, "ACCOUNTS");
        assert_eq!(m.rewritten_path, "/123");
    }

    #[test]
    fn rewrites_nested_segments() {
        let table = RouteTable::from_config(&bank_rules()).unwrap();
        let m = table.resolve("/bank/loans/myLoans").unwrap();
        assert_eq!(m.service, "LOANS");
        assert_eq!(m.rewritten_path, "/myLoans");
    }

    #[test]
    fn unmatched_path_yields_none() {
        let table = RouteTable::from_config(&bank_rules()).unwrap();
        assert!(table.resolve("/bank/unknown/x").is_none());
        assert!(table.resolve("/sayHello").is_none());
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        let mut rules = bank_rules();
        rules.insert(
            0,
            RouteRuleConfig {
                pattern: "/bank/(?<rest>.*)".to_string(),
                rewrite: "/catch-all/${rest}".to_string(),
                service: "CATCHALL".to_string(),
            },
        );
        let table = RouteTable::from_config(&rules).unwrap();
        let m = table.resolve("/bank/accounts/123").unwrap();
        assert_eq!(m.service, "CATCHALL");
        assert_eq!(m.rewritten_path, "/catch-all/accounts/123");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let rules = vec![RouteRuleConfig {
            pattern: "/bank/(".to_string(),
            rewrite: "/".to_string(),
            service: "ACCOUNTS".to_string(),
        }];
        assert!(RouteTable::from_config(&rules).is_err());
    }
}

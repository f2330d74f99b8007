use std::net::SocketAddr;

use regex::Regex;

use crate::config::models::GatewayConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error carrying every problem found in one pass, so operators
/// can fix a config in one round trip.
#[derive(Debug, thiserror::Error, Clone)]
#[error("configuration invalid:\n{}", errors.join("\n"))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

/// Gateway configuration validator. Startup treats any failure here as
/// fatal; nothing past this point re-checks the config.
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.listen_addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "listen_addr '{}' is not a valid socket address",
                config.listen_addr
            ));
        }

        for (index, rule) in config.routes.iter().enumerate() {
            match Regex::new(&rule.pattern) {
                Err(e) => {
                    errors.push(format!("routes[{index}] pattern '{}': {e}", rule.pattern));
                }
                Ok(pattern) => {
                    // A typo'd group reference would silently expand to ""
                    // at rewrite time, so it is rejected here instead.
                    let names: Vec<&str> = pattern.capture_names().flatten().collect();
                    for group in rewrite_group_refs(&rule.rewrite) {
                        let known = group
                            .parse::<usize>()
                            .map(|i| i < pattern.captures_len())
                            .unwrap_or_else(|_| names.contains(&group));
                        if !known {
                            errors.push(format!(
                                "routes[{index}] rewrite references unknown capture group \
                                 '{group}' (pattern '{}')",
                                rule.pattern
                            ));
                        }
                    }
                }
            }
            if rule.rewrite.is_empty() {
                errors.push(format!("routes[{index}] rewrite must not be empty"));
            }
            if !config.services.contains_key(&rule.service) {
                errors.push(format!(
                    "routes[{index}] targets undefined service '{}'",
                    rule.service
                ));
            }
        }

        for (name, service) in &config.services {
            if !service.base_url.starts_with("http://") && !service.base_url.starts_with("https://")
            {
                errors.push(format!(
                    "service '{name}' base_url '{}' must start with http:// or https://",
                    service.base_url
                ));
            }
        }

        if config.breaker.failure_threshold == 0 {
            errors.push("breaker failure_threshold must be greater than 0".to_string());
        }
        if let Err(e) = humantime::parse_duration(&config.breaker.open_duration) {
            errors.push(format!(
                "breaker open_duration '{}': {e}",
                config.breaker.open_duration
            ));
        }

        for (bucket, limit) in &config.rate_limits {
            if limit.requests == 0 {
                errors.push(format!(
                    "rate limit bucket '{bucket}' must admit at least 1 request"
                ));
            }
            if let Err(e) = humantime::parse_duration(&limit.period) {
                errors.push(format!(
                    "rate limit bucket '{bucket}' period '{}': {e}",
                    limit.period
                ));
            }
        }

        if let Err(e) = humantime::parse_duration(&config.client.timeout) {
            errors.push(format!("client timeout '{}': {e}", config.client.timeout));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }
}

/// Capture group references of the form `${name}` appearing in a rewrite
/// template, in order of appearance.
fn rewrite_group_refs(rewrite: &str) -> Vec<&str> {
    let mut refs = Vec::new();
    let mut rest = rewrite;
    while let Some(start) = rest.find("${") {
        rest = &rest[start + 2..];
        match rest.find('}') {
            Some(end) => {
                refs.push(&rest[..end]);
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::models::{RateLimitConfig, RouteRuleConfig, ServiceConfig};

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.routes = vec![RouteRuleConfig {
            pattern: "/bank/accounts/(?<segment>.*)".to_string(),
            rewrite: "/${segment}".to_string(),
            service: "ACCOUNTS".to_string(),
        }];
        config.services.insert(
            "ACCOUNTS".to_string(),
            ServiceConfig {
                base_url: "http://accounts:8080".to_string(),
            },
        );
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert!(GatewayConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let mut config = valid_config();
        config.listen_addr = "not-an-address".to_string();
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("listen_addr")));
    }

    #[test]
    fn rejects_route_to_undefined_service() {
        let mut config = valid_config();
        config.routes[0].service = "LOANS".to_string();
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("undefined service")));
    }

    #[test]
    fn rejects_invalid_pattern_and_duration_together() {
        let mut config = valid_config();
        config.routes[0].pattern = "/bank/(".to_string();
        config.breaker.open_duration = "forever".to_string();
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.errors.len() >= 2);
    }

    #[test]
    fn rejects_zero_request_bucket() {
        let mut config = valid_config();
        config.rate_limits = HashMap::from([(
            "sayHello".to_string(),
            RateLimitConfig {
                requests: 0,
                period: "1s".to_string(),
            },
        )]);
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("sayHello")));
    }

    #[test]
    fn rejects_rewrite_with_unknown_group() {
        let mut config = valid_config();
        config.routes[0].rewrite = "/${segmnt}".to_string();
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(
            err.errors
                .iter()
                .any(|e| e.contains("unknown capture group 'segmnt'"))
        );
    }

    #[test]
    fn accepts_numeric_group_reference() {
        let mut config = valid_config();
        config.routes[0].rewrite = "/${1}".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut config = valid_config();
        config.services.insert(
            "LOANS".to_string(),
            ServiceConfig {
                base_url: "loans:8080".to_string(),
            },
        );
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("base_url")));
    }
}

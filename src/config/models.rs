//! Configuration data structures for Bankgate.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files.
//! They are intentionally serde-friendly and include defaults so that minimal
//! configs remain concise. Everything here is loaded once at process start
//! and immutable thereafter.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::model::Account;

/// One routing rule: a regex path pattern, a rewrite template referencing the
/// pattern's named capture groups, and the logical target service name.
/// Rules apply in declared order, first match wins.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteRuleConfig {
    pub pattern: String,
    pub rewrite: String,
    pub service: String,
}

/// Address book entry for one peer service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
}

/// Circuit breaker thresholds shared by every protected operation.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call. Parsed by
    /// humantime, e.g. "30s", "5m".
    pub open_duration: String,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: "30s".to_string(),
        }
    }
}

/// Admission quota for one named endpoint bucket.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    /// Parsed by humantime, e.g. "1s", "5m".
    pub period: String,
}

/// Outbound HTTP client tuning.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-call timeout for downstream requests; expiry is treated as the
    /// peer being unavailable.
    pub timeout: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: "2s".to_string(),
        }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    #[serde(default)]
    pub routes: Vec<RouteRuleConfig>,
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,
    #[serde(default)]
    pub client: ClientConfig,
    /// Demo seed for the in-memory account store.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            routes: Vec::new(),
            services: HashMap::new(),
            breaker: BreakerConfig::default(),
            rate_limits: HashMap::new(),
            client: ClientConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// The default bank routing table: `/bank/<svc>/**` stripped of its
    /// prefix and forwarded to the matching service.
    pub fn bank_routes() -> Vec<RouteRuleConfig> {
        ["accounts", "loans", "cards"]
            .into_iter()
            .map(|name| RouteRuleConfig {
                pattern: format!("/bank/{name}/(?<segment>.*)"),
                rewrite: "/${segment}".to_string(),
                service: name.to_uppercase(),
            })
            .collect()
    }
}

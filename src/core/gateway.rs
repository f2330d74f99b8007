//! Core gateway orchestration service.
//!
//! `GatewayService` aggregates immutable configuration (`GatewayConfig`) with
//! the process-wide runtime state: the compiled route table, the per-operation
//! circuit breakers, and the per-bucket rate limiters. It provides:
//! * First-match route lookup with path rewriting
//! * Breaker lookup by operation name
//! * Endpoint admission checks
//!
//! This layer deliberately avoids I/O and only manipulates in-memory data so
//! it remains fast and easily testable in isolation.
use std::{sync::Arc, time::Duration};

use crate::{
    config::models::GatewayConfig,
    core::{
        circuit_breaker::{BreakerRegistry, BreakerSettings, CircuitBreaker},
        rate_limiter::EndpointRateLimiter,
        router::{RouteMatch, RouteTable},
    },
};

/// Central orchestrator for routing, breaking, and admission control. Built
/// once at startup from a validated config; cheap to share via `Arc`.
pub struct GatewayService {
    config: Arc<GatewayConfig>,
    routes: RouteTable,
    breakers: Arc<BreakerRegistry>,
    limiter: EndpointRateLimiter,
    client_timeout: Duration,
}

impl GatewayService {
    /// Compile routes and pre-build limiter buckets and breaker settings.
    /// The config is expected to have passed validation; errors here mean a
    /// caller skipped it, and startup treats them as fatal.
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self, String> {
        let routes = RouteTable::from_config(&config.routes)?;
        let limiter = EndpointRateLimiter::from_config(&config.rate_limits)?;

        let open_duration = humantime::parse_duration(&config.breaker.open_duration)
            .map_err(|e| format!("invalid breaker open_duration: {e}"))?;
        let breakers = Arc::new(BreakerRegistry::new(BreakerSettings {
            failure_threshold: config.breaker.failure_threshold,
            open_duration,
        }));

        let client_timeout = humantime::parse_duration(&config.client.timeout)
            .map_err(|e| format!("invalid client timeout: {e}"))?;

        Ok(Self {
            config,
            routes,
            breakers,
            limiter,
            client_timeout,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// First-match route lookup with rewrite applied.
    pub fn resolve_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.resolve(path)
    }

    /// The shared breaker registry, for components that protect operations.
    pub fn breakers(&self) -> Arc<BreakerRegistry> {
        self.breakers.clone()
    }

    pub fn breaker(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create(operation)
    }

    /// Endpoint admission check; unknown buckets admit.
    pub fn admit(&self, bucket: &str) -> bool {
        self.limiter.admit(bucket)
    }

    /// Bounded timeout applied to every downstream call.
    pub fn client_timeout(&self) -> Duration {
        self.client_timeout
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::models::{RateLimitConfig, ServiceConfig};

    fn service_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.routes = GatewayConfig::bank_routes();
        for name in ["ACCOUNTS", "LOANS", "CARDS"] {
            config.services.insert(
                name.to_string(),
                ServiceConfig {
                    base_url: format!("http://{}:8080", name.to_lowercase()),
                },
            );
        }
        config.rate_limits = HashMap::from([(
            "sayHello".to_string(),
            RateLimitConfig {
                requests: 1,
                period: "10s".to_string(),
            },
        )]);
        config
    }

    #[test]
    fn builds_routes_and_buckets_from_config() {
        let service = GatewayService::new(Arc::new(service_config())).unwrap();
        assert_eq!(service.route_count(), 3);

        let m = service.resolve_route("/bank/cards/myCards").unwrap();
        assert_eq!(m.service, "CARDS");
        assert_eq!(m.rewritten_path, "/myCards");

        assert!(service.admit("sayHello"));
        assert!(!service.admit("sayHello"));
    }

    #[test]
    fn breaker_is_shared_by_operation_name() {
        let service = GatewayService::new(Arc::new(service_config())).unwrap();
        let a = service.breaker("customer-details");
        let b = service.breaker("customer-details");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn bad_breaker_duration_fails_construction() {
        let mut config = service_config();
        config.breaker.open_duration = "forever".to_string();
        assert!(GatewayService::new(Arc::new(config)).is_err());
    }
}

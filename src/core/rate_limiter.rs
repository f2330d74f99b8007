//! Admission control for named endpoints, built atop `governor`.
//!
//! One quota per configured bucket name. The limiter is cooperative: it never
//! blocks or builds a response itself, it only answers yes/no so the caller
//! can serve its own fast degraded reply. A denial is a designed outcome, not
//! an error. Buckets without configuration admit everything, limiting is
//! opt-in per endpoint.
use std::{collections::HashMap, num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};

use crate::config::models::RateLimitConfig;

type DirectRateLimiterImpl = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared per-bucket admission state, read-modify-written by every concurrent
/// request through governor's internal atomics.
pub struct EndpointRateLimiter {
    buckets: scc::HashMap<String, Arc<DirectRateLimiterImpl>>,
}

impl EndpointRateLimiter {
    /// Build all configured buckets up front so the hot path never allocates.
    pub fn from_config(configs: &HashMap<String, RateLimitConfig>) -> Result<Self, String> {
        let buckets = scc::HashMap::new();
        for (name, cfg) in configs {
            let period = humantime::parse_duration(&cfg.period)
                .map_err(|e| format!("invalid period '{}' for bucket '{name}': {e}", cfg.period))?;
            let requests = NonZeroU32::new(cfg.requests)
                .ok_or_else(|| format!("bucket '{name}' must admit at least 1 request"))?;
            // One cell per period/R so the full burst of R is available
            // again once the window rolls over.
            let quota = Quota::with_period(period / cfg.requests)
                .ok_or_else(|| format!("invalid period duration for bucket '{name}'"))?
                .allow_burst(requests);

            tracing::info!(
                bucket = %name,
                requests = cfg.requests,
                period = %cfg.period,
                "creating rate limiter bucket"
            );
            let _ = buckets.insert_sync(name.clone(), Arc::new(RateLimiter::direct(quota)));
        }
        Ok(Self { buckets })
    }

    /// Answer whether one more request may reach the protected handler.
    pub fn admit(&self, bucket: &str) -> bool {
        self.buckets
            .read_sync(bucket, |_, limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn single_bucket(requests: u32, period: &str) -> HashMap<String, RateLimitConfig> {
        let mut cfgs = HashMap::new();
        cfgs.insert(
            "sayHello".to_string(),
            RateLimitConfig {
                requests,
                period: period.to_string(),
            },
        );
        cfgs
    }

    #[test]
    fn admits_up_to_quota_then_denies() {
        let limiter = EndpointRateLimiter::from_config(&single_bucket(3, "10s")).unwrap();
        for _ in 0..3 {
            assert!(limiter.admit("sayHello"));
        }
        assert!(!limiter.admit("sayHello"));
    }

    #[tokio::test]
    async fn admission_resets_after_window() {
        let limiter = EndpointRateLimiter::from_config(&single_bucket(2, "50ms")).unwrap();
        assert!(limiter.admit("sayHello"));
        assert!(limiter.admit("sayHello"));
        assert!(!limiter.admit("sayHello"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.admit("sayHello"));
    }

    #[tokio::test]
    async fn full_quota_returns_after_rollover() {
        let limiter = EndpointRateLimiter::from_config(&single_bucket(2, "50ms")).unwrap();
        assert!(limiter.admit("sayHello"));
        assert!(limiter.admit("sayHello"));
        assert!(!limiter.admit("sayHello"));

        // A whole window later the entire burst is admissible again, not
        // just a single replenished cell.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.admit("sayHello"));
        assert!(limiter.admit("sayHello"));
    }

    #[test]
    fn unknown_bucket_admits() {
        let limiter = EndpointRateLimiter::from_config(&HashMap::new()).unwrap();
        assert!(limiter.admit("anything"));
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn zero_requests_rejected_at_build() {
        assert!(EndpointRateLimiter::from_config(&single_bucket(0, "1s")).is_err());
    }

    #[test]
    fn invalid_period_rejected_at_build() {
        assert!(EndpointRateLimiter::from_config(&single_bucket(1, "soon")).is_err());
    }
}

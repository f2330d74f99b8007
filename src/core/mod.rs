pub mod aggregator;
pub mod circuit_breaker;
pub mod correlation;
pub mod dispatch;
pub mod gateway;
pub mod model;
pub mod rate_limiter;
pub mod router;

pub use aggregator::CustomerAggregator;
pub use circuit_breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use correlation::{CORRELATION_HEADER, CorrelationContext};
pub use dispatch::Dispatcher;
pub use gateway::GatewayService;
pub use rate_limiter::EndpointRateLimiter;
pub use router::RouteTable;

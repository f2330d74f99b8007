//! Bankgate - resilient edge gateway for the bank service mesh.
//!
//! Bankgate sits in front of the accounts, loans and cards services and owns
//! the cross-service resiliency and tracing layer, implemented with a
//! **hexagonal architecture**:
//!
//! - a correlation id is assigned to every inbound request at the edge and
//!   propagated through the whole downstream call graph via the
//!   `bank-correlation-id` header, then echoed on the response;
//! - proxied paths (`/bank/accounts/**`, `/bank/loans/**`, `/bank/cards/**`)
//!   are matched against an ordered rewrite table and forwarded to the
//!   resolved peer address;
//! - the customer-details aggregation (one local lookup plus a two-way
//!   fan-out) runs under a per-operation circuit breaker with an explicit
//!   fallback that omits the tertiary record set;
//! - a cooperative rate limiter guards the greeting endpoint.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use bankgate::{GatewayService, config::models::GatewayConfig};
//!
//! # fn main() -> eyre::Result<()> {
//! let cfg = GatewayConfig::default();
//! let gateway = Arc::new(GatewayService::new(Arc::new(cfg)).map_err(|e| eyre::eyre!(e))?);
//! // Wire this into the GatewayHandler adapter (see the binary crate).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters**
//! (implementations) while keeping business logic inside `core`. The
//! collaborators the gateway does not own — the persistent account lookup,
//! service discovery, and the HTTP transport — exist only as ports here.
//!
//! # Error Handling
//! Library paths return domain error types (`thiserror`); startup and
//! adapter plumbing return `eyre::Result` with context attached via
//! `WrapErr`. A tripped breaker or a denied admission is control flow, not
//! an error.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{GatewayHandler, InMemoryAccountStore, PeerHttpClient, StaticServiceRegistry},
    core::{
        CORRELATION_HEADER, BreakerState, CorrelationContext, CustomerAggregator, Dispatcher,
        GatewayService,
    },
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};

pub mod account_store;
pub mod http_client;
pub mod http_handler;
pub mod service_registry;

/// Re-export commonly used types from adapters
pub use account_store::InMemoryAccountStore;
pub use http_client::PeerHttpClient;
pub use http_handler::GatewayHandler;
pub use service_registry::StaticServiceRegistry;

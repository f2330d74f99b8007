pub mod account_store;
pub mod http_client;
pub mod service_registry;

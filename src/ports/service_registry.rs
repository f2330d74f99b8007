use thiserror::Error;

/// Name resolution failure. Callers in the dispatch path treat this the same
/// as an unavailable peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service '{0}' is not registered")]
    Unresolved(String),
}

/// ServiceRegistry resolves a logical service name (e.g. "LOANS") to a
/// reachable base address. Discovery itself is an external concern; the
/// gateway only depends on this lookup.
pub trait ServiceRegistry: Send + Sync + 'static {
    fn resolve(&self, name: &str) -> Result<String, RegistryError>;
}

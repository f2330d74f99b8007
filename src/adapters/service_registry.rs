use std::collections::HashMap;

use crate::{
    config::models::ServiceConfig,
    ports::service_registry::{RegistryError, ServiceRegistry},
};

/// Registry backed by the static `services` table in the configuration.
/// Stands in for a discovery system: logical name in, base address out.
pub struct StaticServiceRegistry {
    services: HashMap<String, String>,
}

impl StaticServiceRegistry {
    pub fn new(services: &HashMap<String, ServiceConfig>) -> Self {
        let services = services
            .iter()
            .map(|(name, cfg)| {
                (
                    name.clone(),
                    cfg.base_url.trim_end_matches('/').to_string(),
                )
            })
            .collect();
        Self { services }
    }
}

impl ServiceRegistry for StaticServiceRegistry {
    fn resolve(&self, name: &str) -> Result<String, RegistryError> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Unresolved(name.to_string()))
    }
}

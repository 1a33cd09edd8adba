//! The shared service registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::config::ServiceConfig;
use crate::registry::service::{Service, ServiceView};

/// Concurrent map of service name to registered entry.
///
/// Lookups take the read lock and clone the `Arc` out; mutations
/// (register, update, deregister) take the write lock. The lock is never
/// held across upstream I/O.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<Service>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the registry from boot configuration.
    pub fn populate(&self, configs: &[ServiceConfig]) {
        tracing::info!(count = configs.len(), "Populating registry services");
        for config in configs {
            self.register(Service::from_config(config));
        }
    }

    /// Register a service, replacing any entry with the same name.
    pub fn register(&self, service: Service) {
        tracing::info!(name = %service.name, addr = %service.addr, "Registering service");
        let mut services = self.services.write().expect("registry lock poisoned");
        if services.contains_key(&service.name) {
            tracing::warn!(name = %service.name, "Service already exists, replacing");
        }
        services.insert(service.name.clone(), Arc::new(service));
    }

    /// Replace an existing entry; a no-op returning false when absent.
    pub fn update(&self, service: Service) -> bool {
        tracing::info!(name = %service.name, "Updating registered service");
        let mut services = self.services.write().expect("registry lock poisoned");
        match services.get_mut(&service.name) {
            Some(entry) => {
                *entry = Arc::new(service);
                true
            }
            None => false,
        }
    }

    /// Remove a service; absent names are ignored.
    pub fn deregister(&self, name: &str) {
        tracing::info!(name, "Deregistering service");
        let mut services = self.services.write().expect("registry lock poisoned");
        services.remove(name);
    }

    /// Look up the live entry for a service.
    pub fn get(&self, name: &str) -> Option<Arc<Service>> {
        let services = self.services.read().expect("registry lock poisoned");
        services.get(name).cloned()
    }

    /// Address of a service, empty when unknown.
    pub fn address(&self, name: &str) -> String {
        self.get(name).map(|s| s.addr.clone()).unwrap_or_default()
    }

    /// Fallback URI of a service, empty when unknown or unset.
    pub fn fallback_uri(&self, name: &str) -> String {
        self.get(name)
            .map(|s| s.fallback_uri.clone())
            .unwrap_or_default()
    }

    /// Serializable snapshot for `GET /services`.
    pub fn snapshot(&self) -> BTreeMap<String, ServiceView> {
        let services = self.services.read().expect("registry lock poisoned");
        services
            .iter()
            .map(|(name, service)| (name.clone(), service.view()))
            .collect()
    }

    /// Probe targets `(name, addr, uri)` for health-enabled entries.
    ///
    /// Snapshots under the read lock so the heartbeat can probe without
    /// holding it.
    pub fn health_targets(&self) -> Vec<(String, String, String)> {
        let services = self.services.read().expect("registry lock poisoned");
        services
            .values()
            .filter(|s| s.health.is_enabled())
            .map(|s| (s.name.clone(), s.addr.clone(), s.health.uri.clone()))
            .collect()
    }
}

//! Registry mapping provider ids to factories.

use std::fmt::{self, Debug};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use crate::provider::{FactoryConfig, ProviderFactory, ProviderMetadata, SpiError};

/// Factories for one extension point.
///
/// Registration happens at startup; lookups are lock-free afterwards.
pub struct FactoryRegistry<P> {
    /// Name of the extension point, used in errors and logs.
    spi_name: &'static str,

    /// Map of provider id to factory.
    factories: DashMap<&'static str, Arc<dyn ProviderFactory<P>>>,

    /// Provider id used when configuration does not name one.
    default: RwLock<Option<&'static str>>,
}

impl<P> Debug for FactoryRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("spi_name", &self.spi_name)
            .field("providers", &self.list_providers())
            .field("default", &*self.default.read())
            .finish()
    }
}

impl<P> FactoryRegistry<P> {
    /// Creates a new empty registry for the named extension point.
    #[must_use]
    pub fn new(spi_name: &'static str) -> Self {
        Self {
            spi_name,
            factories: DashMap::new(),
            default: RwLock::new(None),
        }
    }

    /// Returns the extension point name.
    #[must_use]
    pub const fn spi_name(&self) -> &'static str {
        self.spi_name
    }

    /// Registers a factory.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::DuplicateProvider`] if the id is taken.
    pub fn register<F>(&self, factory: F) -> Result<(), SpiError>
    where
        F: ProviderFactory<P> + 'static,
    {
        self.register_arc(Arc::new(factory))
    }

    /// Registers a shared factory.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::DuplicateProvider`] if the id is taken.
    pub fn register_arc(&self, factory: Arc<dyn ProviderFactory<P>>) -> Result<(), SpiError> {
        let id = factory.id();
        match self.factories.entry(id) {
            Entry::Occupied(_) => Err(SpiError::DuplicateProvider(format!(
                "{}:{id}",
                self.spi_name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(factory);
                tracing::debug!(spi = self.spi_name, provider = id, "registered factory");
                Ok(())
            }
        }
    }

    /// Creates an instance from the factory registered under `provider_id`.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::ProviderNotFound`] for an unknown id, or whatever
    /// the factory returns.
    pub fn create(&self, provider_id: &str, config: &dyn FactoryConfig) -> Result<P, SpiError> {
        // Clone the Arc so the map shard is not held while the factory runs.
        let factory = self
            .factories
            .get(provider_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                SpiError::ProviderNotFound(format!("{}:{provider_id}", self.spi_name))
            })?;

        tracing::debug!(spi = self.spi_name, provider = provider_id, "creating provider");
        factory.create(config)
    }

    /// Creates an instance from the default factory.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::ProviderNotFound`] if no default is set.
    pub fn create_default(&self, config: &dyn FactoryConfig) -> Result<P, SpiError> {
        let id = self
            .get_default()
            .ok_or_else(|| SpiError::ProviderNotFound(format!("{}:<default>", self.spi_name)))?;
        self.create(id, config)
    }

    /// Sets the default provider.
    pub fn set_default(&self, provider_id: &'static str) {
        *self.default.write() = Some(provider_id);
    }

    /// Gets the default provider id.
    #[must_use]
    pub fn get_default(&self) -> Option<&'static str> {
        *self.default.read()
    }

    /// Lists registered provider ids, highest priority first, then by id.
    #[must_use]
    pub fn list_providers(&self) -> Vec<&'static str> {
        let mut entries: Vec<(i32, &'static str)> = self
            .factories
            .iter()
            .map(|entry| (entry.value().order(), *entry.key()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        entries.into_iter().map(|(_, id)| id).collect()
    }

    /// Gets provider metadata by id.
    #[must_use]
    pub fn get_metadata(&self, provider_id: &str) -> Option<ProviderMetadata> {
        self.factories
            .get(provider_id)
            .map(|entry| entry.value().metadata())
    }

    /// Checks if a provider is registered.
    #[must_use]
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.factories.contains_key(provider_id)
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.factories.len()
    }

    /// Validates that required providers are registered.
    ///
    /// ## Errors
    ///
    /// Returns an error naming the first missing provider.
    pub fn validate_required(&self, provider_ids: &[&str]) -> Result<(), SpiError> {
        for provider_id in provider_ids {
            if !self.has_provider(provider_id) {
                return Err(SpiError::ProviderNotFound(format!(
                    "{}:{provider_id}",
                    self.spi_name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::provider::FnFactory;

    fn counter_registry() -> FactoryRegistry<u32> {
        let registry = FactoryRegistry::new("counter");
        registry
            .register(FnFactory::new("one", |_: &dyn FactoryConfig| Ok(1)))
            .unwrap();
        registry
            .register(FnFactory::with_metadata(
                ProviderMetadata {
                    id: "ten",
                    name: "Ten",
                    description: "Always ten",
                    priority: 10,
                },
                |_: &dyn FactoryConfig| Ok(10),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn registry_starts_empty() {
        let registry: FactoryRegistry<u32> = FactoryRegistry::new("test");
        assert_eq!(registry.provider_count(), 0);
        assert!(registry.list_providers().is_empty());
    }

    #[test]
    fn create_by_id() {
        let registry = counter_registry();
        assert_eq!(registry.create("one", &HashMap::new()).unwrap(), 1);
        assert_eq!(registry.create("ten", &HashMap::new()).unwrap(), 10);
    }

    #[test]
    fn unknown_id_is_provider_not_found() {
        let registry = counter_registry();
        let err = registry.create("JPA", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SpiError::ProviderNotFound(ref id) if id == "counter:JPA"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = counter_registry();
        let err = registry
            .register(FnFactory::new("one", |_: &dyn FactoryConfig| Ok(2)))
            .unwrap_err();
        assert!(matches!(err, SpiError::DuplicateProvider(_)));
        assert_eq!(registry.create("one", &HashMap::new()).unwrap(), 1);
    }

    #[test]
    fn providers_listed_by_priority() {
        let registry = counter_registry();
        assert_eq!(registry.list_providers(), vec!["ten", "one"]);
        assert_eq!(registry.get_metadata("ten").unwrap().name, "Ten");
    }

    #[test]
    fn default_provider() {
        let registry = counter_registry();
        assert!(registry.create_default(&HashMap::new()).is_err());
        registry.set_default("ten");
        assert_eq!(registry.get_default(), Some("ten"));
        assert_eq!(registry.create_default(&HashMap::new()).unwrap(), 10);
    }

    #[test]
    fn validate_required_fails_for_missing() {
        let registry = counter_registry();
        assert!(registry.validate_required(&["one", "ten"]).is_ok());
        assert!(registry.validate_required(&["one", "missing"]).is_err());
    }
}

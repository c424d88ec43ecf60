//! Registry back-end selection.
//!
//! Providers name their registries in configuration (`TokenRegistry=FILE`).
//! [`RegistryFactories`] turns that name into an instance through the SPI
//! factory registries, so deployments can plug in their own back-ends under
//! new ids.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use sts_core::{RegistryKind, StsResult};
use sts_spi::{FactoryConfig, FactoryRegistry, FnFactory, SpiError};

use crate::file::{FileRevocationRegistry, FileTokenRegistry};
use crate::revocation::{InMemoryRevocationRegistry, RevocationRegistry};
use crate::token::{InMemoryTokenRegistry, TokenRegistry};

/// Id of the in-memory back-ends.
pub const MEMORY_REGISTRY: &str = "MEMORY";

/// Id of the JSON-file back-ends.
pub const FILE_REGISTRY: &str = "FILE";

/// Option key carrying the file path for [`FILE_REGISTRY`].
pub const PATH_OPTION: &str = "path";

/// Factories for token and revocation registries.
#[derive(Debug)]
pub struct RegistryFactories {
    /// Token registry factories.
    pub tokens: FactoryRegistry<Arc<dyn TokenRegistry>>,
    /// Revocation registry factories.
    pub revocations: FactoryRegistry<Arc<dyn RevocationRegistry>>,
}

impl RegistryFactories {
    /// Creates factories with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tokens: FactoryRegistry::new("token-registry"),
            revocations: FactoryRegistry::new("revocation-registry"),
        }
    }

    /// Creates factories with the `MEMORY` and `FILE` back-ends registered.
    ///
    /// ## Errors
    ///
    /// Never fails in practice; registration into fresh registries cannot collide.
    pub fn with_builtin() -> Result<Self, SpiError> {
        let factories = Self::empty();

        factories.tokens.register(FnFactory::new(
            MEMORY_REGISTRY,
            |_: &dyn FactoryConfig| -> Result<Arc<dyn TokenRegistry>, SpiError> {
                Ok(Arc::new(InMemoryTokenRegistry::new()))
            },
        ))?;
        factories.tokens.register(FnFactory::new(
            FILE_REGISTRY,
            |config: &dyn FactoryConfig| -> Result<Arc<dyn TokenRegistry>, SpiError> {
                let path = required_path(config)?;
                let registry = FileTokenRegistry::open(path)
                    .map_err(|err| SpiError::CreationFailed(err.to_string()))?;
                Ok(Arc::new(registry))
            },
        ))?;

        factories.revocations.register(FnFactory::new(
            MEMORY_REGISTRY,
            |_: &dyn FactoryConfig| -> Result<Arc<dyn RevocationRegistry>, SpiError> {
                Ok(Arc::new(InMemoryRevocationRegistry::new()))
            },
        ))?;
        factories.revocations.register(FnFactory::new(
            FILE_REGISTRY,
            |config: &dyn FactoryConfig| -> Result<Arc<dyn RevocationRegistry>, SpiError> {
                let path = required_path(config)?;
                let registry = FileRevocationRegistry::open(path)
                    .map_err(|err| SpiError::CreationFailed(err.to_string()))?;
                Ok(Arc::new(registry))
            },
        ))?;

        factories.tokens.set_default(MEMORY_REGISTRY);
        factories.revocations.set_default(MEMORY_REGISTRY);
        Ok(factories)
    }

    /// Creates the token registry described by `kind`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for an unregistered back-end and a
    /// processing error if the back-end cannot be opened.
    pub fn token_registry(&self, kind: &RegistryKind) -> StsResult<Arc<dyn TokenRegistry>> {
        let (id, config) = factory_request(kind);
        Ok(self.tokens.create(id, &config)?)
    }

    /// Creates the revocation registry described by `kind`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for an unregistered back-end and a
    /// processing error if the back-end cannot be opened.
    pub fn revocation_registry(
        &self,
        kind: &RegistryKind,
    ) -> StsResult<Arc<dyn RevocationRegistry>> {
        let (id, config) = factory_request(kind);
        Ok(self.revocations.create(id, &config)?)
    }
}

fn factory_request(kind: &RegistryKind) -> (&str, HashMap<String, String>) {
    match kind {
        RegistryKind::Memory => (MEMORY_REGISTRY, HashMap::new()),
        RegistryKind::File(path) => (
            FILE_REGISTRY,
            HashMap::from([(PATH_OPTION.to_string(), path.display().to_string())]),
        ),
        RegistryKind::Named(id) => (id.as_str(), HashMap::new()),
    }
}

fn required_path(config: &dyn FactoryConfig) -> Result<&Path, SpiError> {
    config
        .get(PATH_OPTION)
        .map(Path::new)
        .ok_or_else(|| SpiError::Configuration(format!("{PATH_OPTION} is required")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;
    use sts_core::ErrorKind;

    use super::*;
    use crate::token::RegisteredToken;

    #[test]
    fn builtin_back_ends() {
        let factories = RegistryFactories::with_builtin().unwrap();
        assert_eq!(factories.tokens.list_providers(), vec!["FILE", "MEMORY"]);

        let memory = factories.token_registry(&RegistryKind::Memory).unwrap();
        assert!(memory.is_empty());

        let revocations = factories
            .revocation_registry(&RegistryKind::Memory)
            .unwrap();
        assert!(!revocations.is_revoked("t", "ID_1"));
    }

    #[test]
    fn file_back_end_uses_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let factories = RegistryFactories::with_builtin().unwrap();

        let registry = factories
            .token_registry(&RegistryKind::File(path.clone()))
            .unwrap();
        registry
            .add_token("ID_1", RegisteredToken::new("ID_1", "t", "<a/>", Utc::now()))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unknown_back_end_is_configuration_error() {
        let factories = RegistryFactories::with_builtin().unwrap();
        let err = factories
            .token_registry(&RegistryKind::Named("JPA".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn unreadable_file_is_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("tokens.json");
        std::fs::write(&path, "garbage").unwrap();

        let factories = RegistryFactories::with_builtin().unwrap();
        let err = factories
            .token_registry(&RegistryKind::File(path))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processing);
    }
}

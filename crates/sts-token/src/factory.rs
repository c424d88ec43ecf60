//! Token provider instantiation by factory id.

use std::collections::HashMap;
use std::sync::Arc;

use sts_core::StsResult;
use sts_spi::{FactoryConfig, FactoryRegistry, FnFactory, ProviderFactory, SpiError};

use crate::provider::{ProviderEnvironment, SecurityTokenProvider};
use crate::saml11::{SAML11_PROVIDER_ID, Saml11AssertionTokenProvider};
use crate::saml20::{SAML20_PROVIDER_ID, Saml20AssertionTokenProvider};
use crate::wstrust::{WSTRUST_SAML20_PROVIDER_ID, WsTrustSaml20TokenProvider};

/// Factories for [`SecurityTokenProvider`]s, keyed by the id configuration
/// names them with.
#[derive(Debug)]
pub struct TokenProviderFactories {
    registry: FactoryRegistry<Arc<dyn SecurityTokenProvider>>,
}

impl TokenProviderFactories {
    /// Creates factories with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            registry: FactoryRegistry::new("token-provider"),
        }
    }

    /// Creates factories with the SAML 2.0, SAML 1.1 and WS-Trust SAML 2.0
    /// assertion providers registered. All share `environment`.
    ///
    /// ## Errors
    ///
    /// Never fails in practice; registration into a fresh registry cannot collide.
    pub fn with_builtin(environment: ProviderEnvironment) -> Result<Self, SpiError> {
        let factories = Self::empty();

        let saml20_env = environment.clone();
        factories.registry.register(FnFactory::new(
            SAML20_PROVIDER_ID,
            move |config: &dyn FactoryConfig| -> Result<Arc<dyn SecurityTokenProvider>, SpiError> {
                let provider =
                    Saml20AssertionTokenProvider::from_options(&config.to_map(), &saml20_env)?;
                Ok(Arc::new(provider))
            },
        ))?;

        let saml11_env = environment.clone();
        factories.registry.register(FnFactory::new(
            SAML11_PROVIDER_ID,
            move |config: &dyn FactoryConfig| -> Result<Arc<dyn SecurityTokenProvider>, SpiError> {
                let provider =
                    Saml11AssertionTokenProvider::from_options(&config.to_map(), &saml11_env)?;
                Ok(Arc::new(provider))
            },
        ))?;

        factories.registry.register(FnFactory::new(
            WSTRUST_SAML20_PROVIDER_ID,
            move |config: &dyn FactoryConfig| -> Result<Arc<dyn SecurityTokenProvider>, SpiError> {
                let provider =
                    WsTrustSaml20TokenProvider::from_options(&config.to_map(), &environment)?;
                Ok(Arc::new(provider))
            },
        ))?;

        factories.registry.set_default(SAML20_PROVIDER_ID);
        Ok(factories)
    }

    /// Registers an additional factory.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::DuplicateProvider`] if the id is taken.
    pub fn register<F>(&self, factory: F) -> Result<(), SpiError>
    where
        F: ProviderFactory<Arc<dyn SecurityTokenProvider>> + 'static,
    {
        self.registry.register(factory)
    }

    /// Creates the provider registered under `id`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for an unknown id or rejected options.
    pub fn create(
        &self,
        id: &str,
        options: &HashMap<String, String>,
    ) -> StsResult<Arc<dyn SecurityTokenProvider>> {
        Ok(self.registry.create(id, options)?)
    }

    /// Registered factory ids.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.registry.list_providers()
    }
}

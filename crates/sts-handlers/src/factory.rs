//! Handler instantiation by name.

use std::collections::HashMap;
use std::sync::Arc;

use sts_core::XmlTime;
use sts_protocol_saml::{SamlError, SamlResult};
use sts_spi::{FactoryConfig, FactoryRegistry, FnFactory, ProviderFactory, SpiError};
use sts_token::CoreSts;

use crate::handler::{HandlerRole, SamlHandler};
use crate::handlers::{
    ATTRIBUTE_HANDLER, AUTHENTICATION_HANDLER, AttributeHandler, AttributeManager,
    AttributeOptions, AuthenticationHandler, AuthenticationOptions, ISSUER_TRUST_HANDLER,
    IssuerTrustHandler, LOGOUT_HANDLER, LogoutHandler, MessageSigner,
    SIGNATURE_GENERATION_HANDLER, SignatureGenerationHandler, keys, reject_unknown,
};

/// Collaborators the built-in handlers are created with.
#[derive(Debug, Clone)]
pub struct HandlerEnvironment {
    /// Time source for issue instants and assertion checks.
    pub time: XmlTime,
    /// Token service the IDP issues and cancels assertions through.
    pub sts: Option<Arc<CoreSts>>,
    /// Attribute source for the IDP attribute handler.
    pub attributes: Option<Arc<dyn AttributeManager>>,
    /// Signer for the signature generation handler.
    pub signer: Option<Arc<dyn MessageSigner>>,
}

impl HandlerEnvironment {
    /// An environment with no collaborators besides `time`.
    #[must_use]
    pub const fn new(time: XmlTime) -> Self {
        Self {
            time,
            sts: None,
            attributes: None,
            signer: None,
        }
    }

    /// Sets the token service.
    #[must_use]
    pub fn with_sts(mut self, sts: Arc<CoreSts>) -> Self {
        self.sts = Some(sts);
        self
    }

    /// Sets the attribute source.
    #[must_use]
    pub fn with_attribute_manager(mut self, manager: Arc<dyn AttributeManager>) -> Self {
        self.attributes = Some(manager);
        self
    }

    /// Sets the signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn MessageSigner>) -> Self {
        self.signer = Some(signer);
        self
    }
}

type HandlerBox = Box<dyn SamlHandler>;

/// Factories for [`SamlHandler`]s, keyed by the name configuration uses.
///
/// Every factory reads the handler's role from the `ROLE` option.
#[derive(Debug)]
pub struct HandlerFactories {
    registry: FactoryRegistry<HandlerBox>,
}

fn role_of(config: &dyn FactoryConfig) -> Result<HandlerRole, SpiError> {
    config
        .get(keys::ROLE)
        .ok_or_else(|| SpiError::Configuration(format!("{} option is required", keys::ROLE)))?
        .parse()
        .map_err(to_spi)
}

fn to_spi(err: SamlError) -> SpiError {
    SpiError::Configuration(err.to_string())
}

impl HandlerFactories {
    /// Creates factories with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            registry: FactoryRegistry::new("saml2-handler"),
        }
    }

    /// Creates factories for the built-in handlers, sharing `environment`.
    ///
    /// ## Errors
    ///
    /// Never fails in practice; registration into a fresh registry cannot collide.
    pub fn with_builtin(environment: HandlerEnvironment) -> Result<Self, SpiError> {
        let factories = Self::empty();

        let env = environment.clone();
        factories.register(FnFactory::new(
            AUTHENTICATION_HANDLER,
            move |config: &dyn FactoryConfig| -> Result<HandlerBox, SpiError> {
                let options = AuthenticationOptions::from_options(&config.to_map()).map_err(to_spi)?;
                let mut handler = AuthenticationHandler::new(role_of(config)?, options, env.time.clone());
                if let Some(sts) = &env.sts {
                    handler = handler.with_sts(Arc::clone(sts));
                }
                Ok(Box::new(handler))
            },
        ))?;

        let env = environment.clone();
        factories.register(FnFactory::new(
            LOGOUT_HANDLER,
            move |config: &dyn FactoryConfig| -> Result<HandlerBox, SpiError> {
                reject_unknown(LOGOUT_HANDLER, &config.to_map(), &[]).map_err(to_spi)?;
                let mut handler = LogoutHandler::new(role_of(config)?, env.time.clone());
                if let Some(sts) = &env.sts {
                    handler = handler.with_sts(Arc::clone(sts));
                }
                Ok(Box::new(handler))
            },
        ))?;

        factories.register(FnFactory::new(
            ISSUER_TRUST_HANDLER,
            |config: &dyn FactoryConfig| -> Result<HandlerBox, SpiError> {
                reject_unknown(ISSUER_TRUST_HANDLER, &config.to_map(), &[]).map_err(to_spi)?;
                Ok(Box::new(IssuerTrustHandler::new(role_of(config)?)))
            },
        ))?;

        let attributes = environment.attributes.clone();
        factories.register(FnFactory::new(
            ATTRIBUTE_HANDLER,
            move |config: &dyn FactoryConfig| -> Result<HandlerBox, SpiError> {
                let options = AttributeOptions::from_options(&config.to_map()).map_err(to_spi)?;
                let mut handler = AttributeHandler::new(role_of(config)?, options);
                if let Some(manager) = &attributes {
                    handler = handler.with_manager(Arc::clone(manager));
                }
                Ok(Box::new(handler))
            },
        ))?;

        let signer = environment.signer;
        factories.register(FnFactory::new(
            SIGNATURE_GENERATION_HANDLER,
            move |config: &dyn FactoryConfig| -> Result<HandlerBox, SpiError> {
                reject_unknown(SIGNATURE_GENERATION_HANDLER, &config.to_map(), &[])
                    .map_err(to_spi)?;
                let signer = signer.clone().ok_or_else(|| {
                    SpiError::Configuration(format!(
                        "handler {SIGNATURE_GENERATION_HANDLER} needs a message signer"
                    ))
                })?;
                Ok(Box::new(SignatureGenerationHandler::new(role_of(config)?, signer)))
            },
        ))?;

        Ok(factories)
    }

    /// Registers an additional factory.
    ///
    /// ## Errors
    ///
    /// Returns [`SpiError::DuplicateProvider`] if the name is taken.
    pub fn register<F>(&self, factory: F) -> Result<(), SpiError>
    where
        F: ProviderFactory<HandlerBox> + 'static,
    {
        self.registry.register(factory)
    }

    /// Creates the handler registered under `name` for `role`.
    ///
    /// A `ROLE` entry in `options` takes precedence over `role`, so a
    /// mismatched handler is caught when the chain validates its roles.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::Configuration`] for an unknown name or rejected
    /// options.
    pub fn create(
        &self,
        name: &str,
        role: HandlerRole,
        options: &HashMap<String, String>,
    ) -> SamlResult<HandlerBox> {
        let mut options = options.clone();
        options
            .entry(keys::ROLE.to_string())
            .or_insert_with(|| role.as_str().to_string());
        self.registry.create(name, &options).map_err(|err| match err {
            SpiError::ProviderNotFound(_) => {
                SamlError::Configuration(format!("unknown handler: {name}"))
            }
            other => SamlError::Configuration(other.to_string()),
        })
    }

    /// Registered handler names.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.registry.list_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EchoSigner, manual_time};

    fn factories(signer: bool) -> HandlerFactories {
        let (time, _clock) = manual_time();
        let mut environment = HandlerEnvironment::new(time);
        if signer {
            environment = environment.with_signer(Arc::new(EchoSigner));
        }
        HandlerFactories::with_builtin(environment).unwrap()
    }

    #[test]
    fn builtin_names() {
        let mut names = factories(false).names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                ATTRIBUTE_HANDLER,
                AUTHENTICATION_HANDLER,
                ISSUER_TRUST_HANDLER,
                LOGOUT_HANDLER,
                SIGNATURE_GENERATION_HANDLER,
            ]
        );
    }

    #[test]
    fn creates_handler_with_chain_role() {
        let handler = factories(false)
            .create(AUTHENTICATION_HANDLER, HandlerRole::Idp, &HashMap::new())
            .unwrap();
        assert_eq!(handler.name(), AUTHENTICATION_HANDLER);
        assert_eq!(handler.role(), HandlerRole::Idp);
    }

    #[test]
    fn explicit_role_option_wins() {
        let options = HashMap::from([(keys::ROLE.to_string(), "SP".to_string())]);
        let handler = factories(false)
            .create(LOGOUT_HANDLER, HandlerRole::Idp, &options)
            .unwrap();
        assert_eq!(handler.role(), HandlerRole::Sp);
    }

    #[test]
    fn unknown_handler_and_options_are_rejected() {
        let factories = factories(false);
        let err = factories
            .create("two-factor", HandlerRole::Sp, &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("unknown handler: two-factor"));

        let options = HashMap::from([("TRUST".to_string(), "x".to_string())]);
        assert!(matches!(
            factories.create(ISSUER_TRUST_HANDLER, HandlerRole::Sp, &options),
            Err(SamlError::Configuration(_))
        ));
    }

    #[test]
    fn signature_handler_needs_signer() {
        assert!(factories(false)
            .create(SIGNATURE_GENERATION_HANDLER, HandlerRole::Sp, &HashMap::new())
            .is_err());
        assert!(factories(true)
            .create(SIGNATURE_GENERATION_HANDLER, HandlerRole::Sp, &HashMap::new())
            .is_ok());
    }
}

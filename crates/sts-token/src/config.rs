//! STS definition and the provider lookup tables built from it.
//!
//! [`StsSettings`] is the serialisable description of an STS (usually a TOML
//! file). [`StsConfiguration`] is the immutable result of instantiating every
//! provider it names, indexed the three ways the dispatcher looks them up:
//! by token type, by token element namespace within a family, and by service
//! endpoint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sts_core::{StsError, StsResult, TimeConfig};

use crate::context::TokenFamily;
use crate::factory::TokenProviderFactories;
use crate::provider::SecurityTokenProvider;

/// Serialisable STS definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StsSettings {
    /// Name of the STS, used as the default issuer.
    pub name: String,
    /// Timezone of issue instants; see [`StsSettings::time_config`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeConfig>,
    /// Providers to instantiate.
    pub token_providers: Vec<TokenProviderSettings>,
    /// Service endpoints and the token type each one receives.
    pub service_providers: Vec<ServiceProviderSettings>,
}

impl Default for StsSettings {
    fn default() -> Self {
        Self {
            name: "sts".to_string(),
            time: None,
            token_providers: Vec::new(),
            service_providers: Vec::new(),
        }
    }
}

impl StsSettings {
    /// Parses settings from TOML.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for malformed TOML.
    pub fn from_toml_str(content: &str) -> StsResult<Self> {
        toml::from_str(content)
            .map_err(|err| StsError::Configuration(format!("invalid STS settings: {err}")))
    }

    /// The `[time]` table, or the `STS_TIMEZONE` environment setting when
    /// the settings have none.
    #[must_use]
    pub fn time_config(&self) -> TimeConfig {
        self.time.clone().unwrap_or_else(TimeConfig::from_env)
    }

    /// Reads settings from a TOML file.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> StsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            StsError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

/// One provider entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenProviderSettings {
    /// Factory id, e.g. `saml20-assertion`.
    pub provider: String,
    /// Token type the provider is registered under. Defaults to the
    /// provider's own.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Local name of the token element.
    #[serde(default)]
    pub token_element: Option<String>,
    /// Namespace of the token element. Defaults to the provider's own.
    #[serde(default)]
    pub token_element_ns: Option<String>,
    /// Options handed to the factory.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// One service endpoint entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderSettings {
    /// Endpoint URL the token is for.
    pub endpoint: String,
    /// Token type issued for the endpoint.
    pub token_type: String,
}

/// Immutable provider lookup tables.
#[derive(Debug, Clone)]
pub struct StsConfiguration {
    name: String,
    providers: Vec<Arc<dyn SecurityTokenProvider>>,
    by_token_type: HashMap<String, Arc<dyn SecurityTokenProvider>>,
    by_element: HashMap<(TokenFamily, String), Arc<dyn SecurityTokenProvider>>,
    services: HashMap<String, String>,
}

impl StsConfiguration {
    /// Starts a configuration.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StsConfigurationBuilder {
        StsConfigurationBuilder::new(name)
    }

    /// Instantiates every provider named by `settings` through `factories`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error for unknown factory ids, rejected
    /// options, duplicate token types or services naming an unconfigured
    /// token type.
    pub fn from_settings(
        settings: &StsSettings,
        factories: &TokenProviderFactories,
    ) -> StsResult<Self> {
        let mut builder = Self::builder(settings.name.as_str());
        for entry in &settings.token_providers {
            let provider = factories.create(&entry.provider, &entry.options)?;
            let token_type = entry
                .token_type
                .clone()
                .unwrap_or_else(|| provider.token_type().to_string());
            let element_ns = entry
                .token_element_ns
                .clone()
                .unwrap_or_else(|| provider.supported_qname().namespace);
            tracing::debug!(
                factory = %entry.provider,
                token_type = %token_type,
                element_ns = %element_ns,
                "configured token provider"
            );
            builder = builder.provider_as(provider, token_type, element_ns);
        }
        for service in &settings.service_providers {
            builder = builder.service(service.endpoint.as_str(), service.token_type.as_str());
        }
        builder.build()
    }

    /// Name of the STS.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every configured provider in configuration order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn SecurityTokenProvider>] {
        &self.providers
    }

    /// Provider registered for `token_type`.
    #[must_use]
    pub fn provider_for_token_type(&self, token_type: &str) -> Option<&Arc<dyn SecurityTokenProvider>> {
        self.by_token_type.get(token_type)
    }

    /// Provider handling tokens of `family` whose element is in `namespace`.
    #[must_use]
    pub fn provider_for_element(
        &self,
        family: TokenFamily,
        namespace: &str,
    ) -> Option<&Arc<dyn SecurityTokenProvider>> {
        self.by_element.get(&(family, namespace.to_string()))
    }

    /// Provider issuing tokens for the service at `endpoint`.
    #[must_use]
    pub fn provider_for_service(&self, endpoint: &str) -> Option<&Arc<dyn SecurityTokenProvider>> {
        self.services
            .get(endpoint)
            .and_then(|token_type| self.by_token_type.get(token_type))
    }

    /// Token type configured for the service at `endpoint`.
    #[must_use]
    pub fn service_token_type(&self, endpoint: &str) -> Option<&str> {
        self.services.get(endpoint).map(String::as_str)
    }
}

/// Builds a [`StsConfiguration`].
#[derive(Debug)]
pub struct StsConfigurationBuilder {
    name: String,
    providers: Vec<(Arc<dyn SecurityTokenProvider>, String, String)>,
    services: Vec<(String, String)>,
}

impl StsConfigurationBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Adds a provider under its own token type and element namespace.
    #[must_use]
    pub fn provider(self, provider: Arc<dyn SecurityTokenProvider>) -> Self {
        let token_type = provider.token_type().to_string();
        let element_ns = provider.supported_qname().namespace;
        self.provider_as(provider, token_type, element_ns)
    }

    /// Adds a provider under an explicit token type and element namespace.
    #[must_use]
    pub fn provider_as(
        mut self,
        provider: Arc<dyn SecurityTokenProvider>,
        token_type: impl Into<String>,
        element_ns: impl Into<String>,
    ) -> Self {
        self.providers.push((provider, token_type.into(), element_ns.into()));
        self
    }

    /// Routes `endpoint` to the provider of `token_type`.
    #[must_use]
    pub fn service(mut self, endpoint: impl Into<String>, token_type: impl Into<String>) -> Self {
        self.services.push((endpoint.into(), token_type.into()));
        self
    }

    /// Builds the lookup tables.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if two providers claim the same token
    /// type or element, or a service names a token type no provider serves.
    pub fn build(self) -> StsResult<StsConfiguration> {
        let mut configuration = StsConfiguration {
            name: self.name,
            providers: Vec::with_capacity(self.providers.len()),
            by_token_type: HashMap::new(),
            by_element: HashMap::new(),
            services: HashMap::new(),
        };

        for (provider, token_type, element_ns) in self.providers {
            if configuration.by_token_type.contains_key(&token_type) {
                return Err(StsError::Configuration(format!(
                    "token type {token_type} is served by more than one provider"
                )));
            }
            let element_key = (provider.family(), element_ns);
            if configuration.by_element.contains_key(&element_key) {
                return Err(StsError::Configuration(format!(
                    "{} elements in {} are handled by more than one provider",
                    element_key.0, element_key.1
                )));
            }
            configuration.by_token_type.insert(token_type, provider.clone());
            configuration.by_element.insert(element_key, provider.clone());
            configuration.providers.push(provider);
        }

        for (endpoint, token_type) in self.services {
            if !configuration.by_token_type.contains_key(&token_type) {
                return Err(StsError::Configuration(format!(
                    "service {endpoint} requests token type {token_type} which no provider serves"
                )));
            }
            configuration.services.insert(endpoint, token_type);
        }

        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sts_core::{ErrorKind, XmlTime};
    use sts_protocol_saml::constants::{SAML_NS, SAML11_NS};
    use sts_registry::RegistryFactories;

    use super::*;
    use crate::provider::ProviderEnvironment;

    const SETTINGS: &str = r#"
        name = "test-sts"

        [time]
        timezone = "+01:00"

        [[token_providers]]
        provider = "saml20-assertion"
        token_element = "Assertion"

        [token_providers.options]
        ASSERTION_VALIDITY = "60000"
        CLOCK_SKEW = "0"

        [[token_providers]]
        provider = "saml11-assertion"

        [[service_providers]]
        endpoint = "https://sp.example.com/acs"
        token_type = "urn:oasis:names:tc:SAML:2.0:assertion"
    "#;

    fn factories() -> TokenProviderFactories {
        let environment = ProviderEnvironment::new(
            XmlTime::system(),
            Arc::new(RegistryFactories::with_builtin().unwrap()),
        );
        TokenProviderFactories::with_builtin(environment).unwrap()
    }

    #[test]
    fn settings_parse_from_toml() {
        let settings = StsSettings::from_toml_str(SETTINGS).unwrap();
        assert_eq!(settings.name, "test-sts");
        assert_eq!(settings.time_config().timezone, "+01:00");
        assert_eq!(settings.token_providers.len(), 2);
        assert_eq!(settings.token_providers[0].options["CLOCK_SKEW"], "0");
        assert_eq!(settings.token_providers[1].token_type, None);
    }

    #[test]
    fn missing_time_table_falls_back_to_environment() {
        let settings = StsSettings::from_toml_str(r#"name = "no-time""#).unwrap();
        assert_eq!(settings.time, None);
        assert_eq!(settings.time_config(), TimeConfig::from_env());

        let written = toml::to_string(&settings).unwrap();
        assert!(!written.contains("[time]"));
    }

    #[test]
    fn settings_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sts.toml");
        std::fs::write(&path, SETTINGS).unwrap();
        assert_eq!(StsSettings::load(&path).unwrap().name, "test-sts");
        assert!(StsSettings::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn providers_are_indexed_three_ways() {
        let settings = StsSettings::from_toml_str(SETTINGS).unwrap();
        let configuration = StsConfiguration::from_settings(&settings, &factories()).unwrap();

        assert_eq!(configuration.name(), "test-sts");
        assert_eq!(configuration.providers().len(), 2);
        assert_eq!(
            configuration.provider_for_token_type(SAML11_NS).unwrap().family(),
            TokenFamily::Saml11
        );
        assert_eq!(
            configuration
                .provider_for_element(TokenFamily::Saml2, SAML_NS)
                .unwrap()
                .token_type(),
            SAML_NS
        );
        assert!(configuration.provider_for_element(TokenFamily::Saml11, SAML_NS).is_none());
        assert_eq!(
            configuration
                .provider_for_service("https://sp.example.com/acs")
                .unwrap()
                .token_type(),
            SAML_NS
        );
        assert!(configuration.provider_for_service("https://unknown").is_none());
    }

    #[test]
    fn unknown_factory_is_a_configuration_error() {
        let settings = StsSettings {
            token_providers: vec![TokenProviderSettings {
                provider: "kerberos".to_string(),
                ..TokenProviderSettings::default()
            }],
            ..StsSettings::default()
        };
        let err = StsConfiguration::from_settings(&settings, &factories()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn rejected_options_fail_configuration() {
        let mut settings = StsSettings::from_toml_str(SETTINGS).unwrap();
        settings.token_providers[0]
            .options
            .insert("ASSERTION_VALIDITY".to_string(), "soon".to_string());
        let err = StsConfiguration::from_settings(&settings, &factories()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn duplicate_token_types_are_rejected() {
        let mut settings = StsSettings::from_toml_str(SETTINGS).unwrap();
        settings.token_providers[1].provider = "saml20-assertion".to_string();
        assert!(StsConfiguration::from_settings(&settings, &factories()).is_err());
    }

    #[test]
    fn services_must_name_a_served_token_type() {
        let mut settings = StsSettings::from_toml_str(SETTINGS).unwrap();
        settings.service_providers[0].token_type = "urn:unknown".to_string();
        let err = StsConfiguration::from_settings(&settings, &factories()).unwrap_err();
        assert!(err.to_string().contains("urn:unknown"));
    }
}

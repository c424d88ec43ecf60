//! Factory traits for the extension points.

use std::collections::HashMap;
use std::fmt::{self, Debug};

use sts_core::StsError;
use thiserror::Error;

/// Error type for SPI operations.
#[derive(Debug, Error)]
pub enum SpiError {
    /// No factory is registered under the requested id.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// A factory with the same id is already registered.
    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    /// The factory failed to build an instance.
    #[error("provider creation failed: {0}")]
    CreationFailed(String),

    /// The options handed to the factory were rejected.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<SpiError> for StsError {
    fn from(err: SpiError) -> Self {
        match err {
            SpiError::CreationFailed(message) => Self::Processing(message),
            other => Self::Configuration(other.to_string()),
        }
    }
}

impl From<StsError> for SpiError {
    fn from(err: StsError) -> Self {
        match err {
            StsError::Configuration(message) => Self::Configuration(message),
            other => Self::CreationFailed(other.to_string()),
        }
    }
}

/// Metadata about a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Unique identifier for this provider.
    pub id: &'static str,

    /// Human-readable name.
    pub name: &'static str,

    /// Description of what this provider does.
    pub description: &'static str,

    /// Priority for ordering (higher = preferred).
    pub priority: i32,
}

impl ProviderMetadata {
    /// Metadata whose name and description are the id.
    #[must_use]
    pub const fn named(id: &'static str) -> Self {
        Self {
            id,
            name: id,
            description: id,
            priority: 0,
        }
    }
}

/// Factory for one kind of provider.
///
/// `P` is whatever the extension point hands out, typically an
/// `Arc<dyn Trait>` or `Box<dyn Trait>`.
pub trait ProviderFactory<P>: Send + Sync + Debug {
    /// Returns the unique identifier for this factory.
    fn id(&self) -> &'static str;

    /// Returns metadata about providers created by this factory.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::named(self.id())
    }

    /// Returns the priority for ordering (higher = preferred).
    fn order(&self) -> i32 {
        self.metadata().priority
    }

    /// Creates a new provider instance.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration is rejected or creation fails.
    fn create(&self, config: &dyn FactoryConfig) -> Result<P, SpiError>;
}

/// Configuration handed to [`ProviderFactory::create`].
pub trait FactoryConfig: Send + Sync {
    /// Gets a string configuration value.
    fn get(&self, key: &str) -> Option<&str>;

    /// Returns every option as an owned map.
    fn to_map(&self) -> HashMap<String, String>;

    /// Gets an integer configuration value.
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Gets a boolean configuration value. `"true"` in any case is true.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
    }
}

impl FactoryConfig for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }

    fn to_map(&self) -> HashMap<String, String> {
        self.clone()
    }
}

/// A factory backed by a closure.
pub struct FnFactory<P> {
    metadata: ProviderMetadata,
    create: Box<dyn Fn(&dyn FactoryConfig) -> Result<P, SpiError> + Send + Sync>,
}

impl<P> FnFactory<P> {
    /// Creates a factory registered under `id`.
    pub fn new<F>(id: &'static str, create: F) -> Self
    where
        F: Fn(&dyn FactoryConfig) -> Result<P, SpiError> + Send + Sync + 'static,
    {
        Self::with_metadata(ProviderMetadata::named(id), create)
    }

    /// Creates a factory with explicit metadata.
    pub fn with_metadata<F>(metadata: ProviderMetadata, create: F) -> Self
    where
        F: Fn(&dyn FactoryConfig) -> Result<P, SpiError> + Send + Sync + 'static,
    {
        Self {
            metadata,
            create: Box::new(create),
        }
    }
}

impl<P> Debug for FnFactory<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl<P> ProviderFactory<P> for FnFactory<P> {
    fn id(&self) -> &'static str {
        self.metadata.id
    }

    fn metadata(&self) -> ProviderMetadata {
        self.metadata.clone()
    }

    fn create(&self, config: &dyn FactoryConfig) -> Result<P, SpiError> {
        (self.create)(config)
    }
}

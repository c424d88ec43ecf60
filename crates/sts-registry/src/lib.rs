//! # sts-registry
//!
//! Shared mutable state of the security token service.
//!
//! ## Registries
//!
//! - [`TokenRegistry`] - issued assertions keyed by assertion ID
//! - [`RevocationRegistry`] - tokens that were cancelled and must never come back
//! - [`NonceCache`] - single-use, session-bound nonces
//!
//! Every registry is safe to share between request threads.
//!
//! ## Expiry
//!
//! Expired entries are removed by an [`ExpiryScheduler`], an explicitly
//! started and stopped periodic task that runs a set of [`Sweep`]s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod expiry;
pub mod factory;
pub mod file;
pub mod nonce;
pub mod revocation;
pub mod token;

pub use error::{RegistryError, RegistryResult};
pub use expiry::{EvictionListener, ExpiryScheduler, Sweep, TokenRegistrySweep};
pub use factory::{FILE_REGISTRY, MEMORY_REGISTRY, RegistryFactories};
pub use file::{FileRevocationRegistry, FileTokenRegistry};
pub use nonce::{NonceCache, NonceStatus};
pub use revocation::{InMemoryRevocationRegistry, RevocationRegistry};
pub use token::{InMemoryTokenRegistry, RegisteredToken, TokenRegistry};

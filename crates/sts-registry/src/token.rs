//! Token registry contract and the in-memory back-end.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::RegistryResult;

/// An issued token as stored in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredToken {
    /// Assertion ID.
    pub id: String,
    /// Token type URI.
    pub token_type: String,
    /// Serialized token.
    pub payload: String,
    /// When the token was (re-)registered.
    pub registered_at: DateTime<Utc>,
    /// End of the token's validity window, if it has one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RegisteredToken {
    /// Creates an entry without an expiry.
    pub fn new(
        id: impl Into<String>,
        token_type: impl Into<String>,
        payload: impl Into<String>,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            token_type: token_type.into(),
            payload: payload.into(),
            registered_at,
            expires_at: None,
        }
    }

    /// Sets the expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Store of issued tokens keyed by assertion ID.
///
/// Implementations must tolerate concurrent calls from many request threads.
/// Concurrent writes to the same ID are last-writer-wins.
pub trait TokenRegistry: Send + Sync + Debug {
    /// Inserts or overwrites the token stored under `id`.
    ///
    /// ## Errors
    ///
    /// Returns [`RegistryError::Io`](crate::RegistryError::Io) if the backing
    /// store is unavailable.
    fn add_token(&self, id: &str, token: RegisteredToken) -> RegistryResult<()>;

    /// Returns the token stored under `id`, if any.
    fn get_token(&self, id: &str) -> Option<RegisteredToken>;

    /// Removes the token stored under `id`. Removing an absent token succeeds.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn remove_token(&self, id: &str) -> RegistryResult<()>;

    /// Removes every token expired at `now` and returns them.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn remove_expired(&self, now: DateTime<Utc>) -> RegistryResult<Vec<RegisteredToken>>;

    /// Number of stored tokens.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Token registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTokenRegistry {
    tokens: DashMap<String, RegisteredToken>,
}

impl InMemoryTokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenRegistry for InMemoryTokenRegistry {
    fn add_token(&self, id: &str, token: RegisteredToken) -> RegistryResult<()> {
        self.tokens.insert(id.to_string(), token);
        tracing::trace!(token_id = id, "token registered");
        Ok(())
    }

    fn get_token(&self, id: &str) -> Option<RegisteredToken> {
        self.tokens.get(id).map(|entry| entry.value().clone())
    }

    fn remove_token(&self, id: &str) -> RegistryResult<()> {
        if self.tokens.remove(id).is_some() {
            tracing::trace!(token_id = id, "token removed");
        }
        Ok(())
    }

    fn remove_expired(&self, now: DateTime<Utc>) -> RegistryResult<Vec<RegisteredToken>> {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        // Re-check on removal: a renewal may have landed since the scan.
        Ok(expired
            .into_iter()
            .filter_map(|id| {
                self.tokens
                    .remove_if(&id, |_, token| token.is_expired(now))
                    .map(|(_, token)| token)
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}

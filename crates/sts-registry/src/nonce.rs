//! Session-scoped nonce cache for HTTP digest challenges.
//!
//! A nonce is handed out to one session and may be presented back exactly
//! once, by that session, within `max_age` of being generated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::distr::{Alphanumeric, SampleString};
use sts_core::Clock;

use crate::error::RegistryResult;
use crate::expiry::Sweep;

const NONCE_LEN: usize = 32;

/// Result of presenting a nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceStatus {
    /// Issued to this session, within its max age, and now consumed.
    Valid,
    /// Issued to this session but older than the max age. Also consumed.
    Stale,
    /// Never issued to this session, or already used.
    Unknown,
}

/// Nonces per session.
#[derive(Debug)]
pub struct NonceCache {
    max_age: TimeDelta,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, HashMap<String, DateTime<Utc>>>,
}

impl NonceCache {
    /// Creates a cache whose nonces live for `max_age`.
    #[must_use]
    pub fn new(max_age: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_age,
            clock,
            sessions: DashMap::new(),
        }
    }

    /// Generates and records a fresh nonce for `session`.
    pub fn generate(&self, session: &str) -> String {
        let nonce = Alphanumeric.sample_string(&mut rand::rng(), NONCE_LEN);
        self.sessions
            .entry(session.to_string())
            .or_default()
            .insert(nonce.clone(), self.clock.now());
        nonce
    }

    /// Checks and consumes `nonce` for `session`.
    pub fn validate(&self, session: &str, nonce: &str) -> NonceStatus {
        let Some(mut nonces) = self.sessions.get_mut(session) else {
            return NonceStatus::Unknown;
        };
        let Some(generated_at) = nonces.remove(nonce) else {
            return NonceStatus::Unknown;
        };
        if self.clock.now() - generated_at > self.max_age {
            tracing::debug!(session, "stale nonce presented");
            NonceStatus::Stale
        } else {
            NonceStatus::Valid
        }
    }

    /// Forgets every nonce issued to `session`.
    pub fn remove_session(&self, session: &str) {
        self.sessions.remove(session);
    }

    /// Number of outstanding nonces across all sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns true if no nonce is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops nonces older than the max age and sessions left without nonces.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.sessions.retain(|_, nonces| {
            let before = nonces.len();
            nonces.retain(|_, generated_at| now - *generated_at <= self.max_age);
            removed += before - nonces.len();
            !nonces.is_empty()
        });
        removed
    }
}

impl Sweep for NonceCache {
    fn name(&self) -> &str {
        "nonce-cache"
    }

    fn sweep(&self) -> RegistryResult<usize> {
        Ok(self.purge_expired())
    }
}

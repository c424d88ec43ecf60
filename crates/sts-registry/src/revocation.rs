//! Revocation registry.
//!
//! Records the IDs of cancelled tokens. Once revoked, a token stays revoked.

use std::fmt::Debug;

use dashmap::DashSet;

use crate::error::RegistryResult;

/// Store of revoked token IDs, scoped by token type.
pub trait RevocationRegistry: Send + Sync + Debug {
    /// Marks a token as revoked.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn revoke_token(&self, token_type: &str, id: &str) -> RegistryResult<()>;

    /// Returns true if the token has been revoked.
    fn is_revoked(&self, token_type: &str, id: &str) -> bool;
}

/// Revocation registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRevocationRegistry {
    revoked: DashSet<(String, String)>,
}

impl InMemoryRevocationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationRegistry for InMemoryRevocationRegistry {
    fn revoke_token(&self, token_type: &str, id: &str) -> RegistryResult<()> {
        self.revoked.insert((token_type.to_string(), id.to_string()));
        tracing::debug!(token_type, token_id = id, "token revoked");
        Ok(())
    }

    fn is_revoked(&self, token_type: &str, id: &str) -> bool {
        self.revoked
            .contains(&(token_type.to_string(), id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revocation_is_scoped_by_type() {
        let registry = InMemoryRevocationRegistry::new();
        assert!(!registry.is_revoked("saml2", "ID_1"));

        registry.revoke_token("saml2", "ID_1").unwrap();
        assert!(registry.is_revoked("saml2", "ID_1"));
        assert!(!registry.is_revoked("saml11", "ID_1"));

        registry.revoke_token("saml2", "ID_1").unwrap();
        assert!(registry.is_revoked("saml2", "ID_1"));
    }
}

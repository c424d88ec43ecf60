//! Caller authorization for STS operations.

use std::collections::HashSet;
use std::fmt::Debug;

use sts_core::{StsError, StsResult};

/// Permission every STS operation requires.
pub const STS_PERMISSION: &str = "sts";

/// The party invoking the STS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Principal name, `None` for anonymous callers.
    pub name: Option<String>,
    /// Roles granted to the caller.
    pub roles: HashSet<String>,
}

impl Caller {
    /// A caller without a principal or roles.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A named caller without roles.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            roles: HashSet::new(),
        }
    }

    /// Grants a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Checks for a role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Name used in logs and events.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

/// Decides whether a caller may perform an action.
pub trait PermissionChecker: Send + Sync + Debug {
    /// Ensures `caller` holds `permission`.
    ///
    /// ## Errors
    ///
    /// Returns [`StsError::PermissionDenied`] if it does not.
    fn check(&self, caller: &Caller, permission: &str) -> StsResult<()>;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn check(&self, _caller: &Caller, _permission: &str) -> StsResult<()> {
        Ok(())
    }
}

/// Refuses everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PermissionChecker for DenyAll {
    fn check(&self, caller: &Caller, permission: &str) -> StsResult<()> {
        Err(denied(caller, permission))
    }
}

/// Grants a permission to callers holding any of the roles mapped to it.
#[derive(Debug, Clone, Default)]
pub struct RoleBasedPermissionChecker {
    grants: Vec<(String, String)>,
}

impl RoleBasedPermissionChecker {
    /// Creates a checker that grants nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets holders of `role` perform `permission`.
    #[must_use]
    pub fn grant(mut self, permission: impl Into<String>, role: impl Into<String>) -> Self {
        self.grants.push((permission.into(), role.into()));
        self
    }

    /// Roles that carry `permission`.
    pub fn roles_for<'a>(&'a self, permission: &'a str) -> impl Iterator<Item = &'a str> {
        self.grants
            .iter()
            .filter(move |(granted, _)| granted == permission)
            .map(|(_, role)| role.as_str())
    }
}

impl PermissionChecker for RoleBasedPermissionChecker {
    fn check(&self, caller: &Caller, permission: &str) -> StsResult<()> {
        if self.roles_for(permission).any(|role| caller.has_role(role)) {
            Ok(())
        } else {
            Err(denied(caller, permission))
        }
    }
}

fn denied(caller: &Caller, permission: &str) -> StsError {
    StsError::PermissionDenied(format!(
        "{} lacks permission '{permission}'",
        caller.display_name()
    ))
}

#[cfg(test)]
mod tests {
    use sts_core::ErrorKind;

    use super::*;

    #[test]
    fn allow_all_grants_anonymous() {
        AllowAll.check(&Caller::anonymous(), STS_PERMISSION).unwrap();
    }

    #[test]
    fn deny_all_names_the_caller() {
        let err = DenyAll.check(&Caller::new("alice"), STS_PERMISSION).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn role_based_checks_granted_roles() {
        let checker = RoleBasedPermissionChecker::new()
            .grant(STS_PERMISSION, "sts-user")
            .grant(STS_PERMISSION, "admin");

        checker
            .check(&Caller::new("bob").with_role("admin"), STS_PERMISSION)
            .unwrap();
        assert!(checker.check(&Caller::new("eve").with_role("guest"), STS_PERMISSION).is_err());
        assert!(checker.check(&Caller::new("bob").with_role("admin"), "other").is_err());
    }
}

//! The acting user of a request.

use super::permissions::UserRole;
use std::collections::BTreeSet;

/// Identity and access checks for whoever is viewing the admin panel.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait Principal {
    fn user_id(&self) -> usize;

    /// Whether the user holds `capability`. Unknown capability names are
    /// simply not held.
    fn has_capability(&self, capability: &str) -> bool;
}

/// A logged-in operator, holding capabilities through roles and through
/// individually granted extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub user_id: usize,
    pub roles: Vec<UserRole>,
    pub extra_capabilities: BTreeSet<String>,
}

impl Operator {
    pub fn new(user_id: usize, roles: Vec<UserRole>) -> Self {
        Self {
            user_id,
            roles,
            extra_capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.extra_capabilities.insert(capability.into());
        self
    }
}

impl Principal for Operator {
    fn user_id(&self) -> usize {
        self.user_id
    }

    fn has_capability(&self, capability: &str) -> bool {
        if self.extra_capabilities.contains(capability) {
            return true;
        }
        self.roles.iter().any(|role| {
            role.capabilities()
                .iter()
                .any(|held| held.as_str() == capability)
        })
    }
}

use std::collections::HashSet;
use uuid::Uuid;

/// Principal represents the authenticated user with their cached grants
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: String,
    /// Explicit grants that are still active. Revoked grants never make it in here.
    pub explicit_permissions: HashSet<String>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
            explicit_permissions: HashSet::new(),
        }
    }

    pub fn with_permissions(mut self, perms: impl IntoIterator<Item = String>) -> Self {
        self.explicit_permissions = perms.into_iter().collect();
        self
    }

    pub fn has_explicit(&self, permission: &str) -> bool {
        self.explicit_permissions.contains(permission)
    }

    pub fn is_super_role(&self) -> bool {
        super::roles::is_super_role(&self.role)
    }
}

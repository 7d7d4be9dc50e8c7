use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::principal::Principal;
use super::table::RolePermissionTable;
use super::WILDCARD;

/// A permission requirement as callers express it: one token or a list of alternatives.
///
/// Normalised to a list at the single entry point (`has_any_permission`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiredPermission {
    One(String),
    Any(Vec<String>),
}

impl RequiredPermission {
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            RequiredPermission::One(token) => vec![token],
            RequiredPermission::Any(tokens) => tokens,
        }
    }

    pub fn tokens(&self) -> Vec<&str> {
        match self {
            RequiredPermission::One(token) => vec![token.as_str()],
            RequiredPermission::Any(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for RequiredPermission {
    fn from(value: &str) -> Self {
        RequiredPermission::One(value.to_string())
    }
}

impl From<String> for RequiredPermission {
    fn from(value: String) -> Self {
        RequiredPermission::One(value)
    }
}

impl From<&[&str]> for RequiredPermission {
    fn from(value: &[&str]) -> Self {
        RequiredPermission::Any(value.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RequiredPermission {
    fn from(value: [&str; N]) -> Self {
        RequiredPermission::Any(value.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Vec<String>> for RequiredPermission {
    fn from(value: Vec<String>) -> Self {
        RequiredPermission::Any(value)
    }
}

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the principal holds `permission`. `None` means unauthenticated.
    fn has_permission(&self, principal: Option<&Principal>, permission: &str) -> bool;

    /// OR semantics: any single matching token grants access. An empty list denies.
    fn has_any_permission(&self, principal: Option<&Principal>, required: &RequiredPermission) -> bool {
        required
            .tokens()
            .into_iter()
            .any(|token| self.has_permission(principal, token))
    }
}

/// Default policy evaluator backed by the role table.
///
/// Evaluation order:
/// 1. no principal -> deny
/// 2. super-role, or role resolves to `*` -> allow
/// 3. role grant or active explicit grant -> allow
/// 4. deny
#[derive(Debug, Clone)]
pub struct DefaultPolicyEvaluator {
    table: Arc<RolePermissionTable>,
}

impl DefaultPolicyEvaluator {
    pub fn new(table: Arc<RolePermissionTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RolePermissionTable {
        &self.table
    }

    /// Role tokens merged with the principal's active explicit grants.
    pub fn effective_permissions(&self, principal: &Principal) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .table
            .permissions_for(&principal.role)
            .union(&principal.explicit_permissions)
            .cloned()
            .collect();
        tokens.sort();
        tokens
    }
}

impl Default for DefaultPolicyEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(RolePermissionTable::builtin()))
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn has_permission(&self, principal: Option<&Principal>, permission: &str) -> bool {
        let Some(principal) = principal else {
            tracing::debug!(permission = %permission, "no principal, denied");
            return false;
        };

        let role_tokens = self.table.permissions_for(&principal.role);

        if principal.is_super_role() || role_tokens.contains(WILDCARD) {
            tracing::debug!(
                user_id = %principal.user_id,
                permission = %permission,
                "super-role bypass"
            );
            return true;
        }

        if role_tokens.contains(permission) {
            tracing::debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                permission = %permission,
                "role permission match"
            );
            return true;
        }

        if principal.has_explicit(permission) {
            tracing::debug!(
                user_id = %principal.user_id,
                permission = %permission,
                "explicit grant match"
            );
            return true;
        }

        tracing::debug!(
            user_id = %principal.user_id,
            permission = %permission,
            "permission denied"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::permissions::*;
    use crate::authz::roles;
    use uuid::Uuid;

    const SAMPLE_TOKENS: [&str; 5] = [
        ACCESS_ACTION_REPORTS,
        CAN_MODIFY_PRIVILEGES,
        VEHICLE_USE_SYSTEM,
        "some_future_token",
        "",
    ];

    fn evaluator() -> DefaultPolicyEvaluator {
        DefaultPolicyEvaluator::default()
    }

    #[test]
    fn null_principal_is_denied_everything() {
        let evaluator = evaluator();
        for token in SAMPLE_TOKENS {
            assert!(!evaluator.has_permission(None, token));
        }
        assert!(!evaluator.has_any_permission(None, &RequiredPermission::from(SAMPLE_TOKENS)));
    }

    #[test]
    fn super_roles_hold_every_token() {
        let evaluator = evaluator();
        for role in roles::SUPER_ROLES {
            let principal = Principal::new(Uuid::new_v4(), role);
            for token in SAMPLE_TOKENS {
                assert!(evaluator.has_permission(Some(&principal), token), "{role} / {token}");
            }
        }
    }

    #[test]
    fn super_role_bypass_holds_even_with_custom_table() {
        let table = RolePermissionTable::new(Vec::<(String, Vec<String>)>::new());
        let evaluator = DefaultPolicyEvaluator::new(Arc::new(table));
        let principal = Principal::new(Uuid::new_v4(), roles::ADMIN);
        assert!(evaluator.has_permission(Some(&principal), ACCESS_ACTION_REPORTS));
    }

    #[test]
    fn wildcard_role_in_table_grants_everything() {
        let table = RolePermissionTable::new([("ops", vec![WILDCARD])]);
        let evaluator = DefaultPolicyEvaluator::new(Arc::new(table));
        let principal = Principal::new(Uuid::new_v4(), "ops");
        assert!(evaluator.has_permission(Some(&principal), "anything"));
    }

    #[test]
    fn explicit_wildcard_is_not_a_bypass() {
        let evaluator = evaluator();
        let principal = Principal::new(Uuid::new_v4(), roles::PATROL)
            .with_permissions(vec![WILDCARD.to_string()]);
        assert!(!evaluator.has_permission(Some(&principal), CAN_MODIFY_PRIVILEGES));
        assert!(!evaluator.has_permission(Some(&principal), ACCESS_ACTION_REPORTS));
    }

    #[test]
    fn patrol_without_grants_cannot_access_reports() {
        let evaluator = evaluator();
        let principal = Principal::new(Uuid::new_v4(), roles::PATROL);
        assert!(!evaluator.has_permission(Some(&principal), ACCESS_ACTION_REPORTS));
        assert!(evaluator.has_permission(Some(&principal), MANAGE_OWN_ACTION_REPORTS));
    }

    #[test]
    fn explicit_grant_extends_role() {
        let evaluator = evaluator();
        let principal = Principal::new(Uuid::new_v4(), roles::PATROL)
            .with_permissions(vec![ACCESS_ACTION_REPORTS.to_string()]);
        assert!(evaluator.has_permission(Some(&principal), ACCESS_ACTION_REPORTS));
    }

    #[test]
    fn unknown_role_fails_closed() {
        let evaluator = evaluator();
        let principal = Principal::new(Uuid::new_v4(), "guest");
        assert!(!evaluator.has_permission(Some(&principal), VIEW_DASHBOARD_EVENTS));
    }

    #[test]
    fn any_permission_is_or_of_single_checks() {
        let evaluator = evaluator();
        let dispatcher = Principal::new(Uuid::new_v4(), roles::DISPATCHER);
        let pairs = [
            (ACCESS_SUMMARIES, VIEW_OWN_SUMMARIES),
            (ACCESS_SUMMARIES, ACCESS_ANALYTICS),
            (VIEW_OWN_SUMMARIES, VEHICLE_USE_SYSTEM),
        ];
        for (a, b) in pairs {
            let expected = evaluator.has_permission(Some(&dispatcher), a)
                || evaluator.has_permission(Some(&dispatcher), b);
            assert_eq!(
                evaluator.has_any_permission(Some(&dispatcher), &RequiredPermission::from([a, b])),
                expected
            );
        }
    }

    #[test]
    fn empty_requirement_list_denies() {
        let evaluator = evaluator();
        let admin = Principal::new(Uuid::new_v4(), roles::ADMIN);
        assert!(!evaluator.has_any_permission(Some(&admin), &RequiredPermission::Any(vec![])));
    }

    #[test]
    fn single_token_requirement_deserializes_from_string_or_list() {
        let one: RequiredPermission = serde_json::from_str(r#""access_summaries""#).unwrap();
        let many: RequiredPermission = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(one.into_tokens(), vec!["access_summaries".to_string()]);
        assert_eq!(many.into_tokens().len(), 2);
    }

    #[test]
    fn effective_permissions_merge_role_and_explicit() {
        let evaluator = evaluator();
        let principal = Principal::new(Uuid::new_v4(), roles::PATROL)
            .with_permissions(vec![ACCESS_ANALYTICS.to_string()]);
        let effective = evaluator.effective_permissions(&principal);
        assert!(effective.contains(&ACCESS_ANALYTICS.to_string()));
        assert!(effective.contains(&MANAGE_OWN_ACTION_REPORTS.to_string()));
    }
}

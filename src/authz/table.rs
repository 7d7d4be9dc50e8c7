use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use crate::errors::AppError;

use super::permissions::*;
use super::roles;
use super::WILDCARD;

/// Immutable role -> capability mapping, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct RolePermissionTable {
    roles: HashMap<String, HashSet<String>>,
}

fn empty_set() -> &'static HashSet<String> {
    static EMPTY: OnceLock<HashSet<String>> = OnceLock::new();
    EMPTY.get_or_init(HashSet::new)
}

impl RolePermissionTable {
    pub fn new<R, T, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, Vec<T>)>,
        R: Into<String>,
        T: Into<String>,
    {
        let roles = entries
            .into_iter()
            .map(|(role, tokens)| (role.into(), tokens.into_iter().map(Into::into).collect()))
            .collect();
        Self { roles }
    }

    /// Built-in table used when no override file is configured.
    pub fn builtin() -> Self {
        Self::new([
            (roles::DEVELOPER, vec![WILDCARD]),
            (roles::ADMIN, vec![WILDCARD]),
            (roles::LEGACY_ADMIN, vec![WILDCARD]),
            (
                roles::UNIT_COMMAND,
                vec![
                    VIEW_DASHBOARD_EVENTS,
                    VIEW_USERS_INFO,
                    VIEW_EVENTS_LIST,
                    ACCESS_ANALYTICS,
                    ACCESS_ACTION_REPORTS,
                    ACCESS_SUMMARIES,
                    MANAGE_OWN_ACTION_REPORTS,
                    MANAGE_EVENTS,
                    VEHICLE_SEARCH_ACCESS,
                ],
            ),
            (
                roles::DISPATCH_COMMANDER,
                vec![
                    VIEW_DASHBOARD_EVENTS,
                    VIEW_USERS_INFO,
                    VIEW_EVENTS_LIST,
                    ACCESS_ACTION_REPORTS,
                    ACCESS_SUMMARIES,
                    MANAGE_OWN_ACTION_REPORTS,
                    MANAGE_EVENTS,
                    VEHICLE_USE_SYSTEM,
                    VEHICLE_SEARCH_ACCESS,
                ],
            ),
            (
                roles::DISPATCHER,
                vec![
                    VIEW_DASHBOARD_EVENTS,
                    VIEW_EVENTS_LIST,
                    MANAGE_OWN_ACTION_REPORTS,
                    VIEW_OWN_SUMMARIES,
                    VEHICLE_USE_SYSTEM,
                    VEHICLE_SEARCH_ACCESS,
                ],
            ),
            (
                roles::PATROL,
                vec![
                    VIEW_DASHBOARD_EVENTS,
                    MANAGE_OWN_ACTION_REPORTS,
                    VIEW_OWN_SUMMARIES,
                    VEHICLE_SEARCH_ACCESS,
                ],
            ),
        ])
    }

    /// Parse a JSON object of `{ "<role>": ["token", ...] }`.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(raw)
            .map_err(|err| AppError::configuration(format!("invalid role permission table: {err}")))?;
        Ok(Self::new(parsed))
    }

    /// Loads `ROLE_PERMISSIONS_FILE` when set, otherwise the built-in table.
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var("ROLE_PERMISSIONS_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                let raw = std::fs::read_to_string(&path).map_err(|err| {
                    AppError::configuration(format!("failed to read ROLE_PERMISSIONS_FILE {path}: {err}"))
                })?;
                let table = Self::from_json(&raw)?;
                tracing::info!(path = %path, roles = table.roles.len(), "loaded role permission table");
                Ok(table)
            }
            _ => Ok(Self::builtin()),
        }
    }

    /// Tokens granted to `role`. Unknown roles get the empty set.
    pub fn permissions_for(&self, role: &str) -> &HashSet<String> {
        self.roles.get(role).unwrap_or_else(|| empty_set())
    }

    pub fn grants_wildcard(&self, role: &str) -> bool {
        self.permissions_for(role).contains(WILDCARD)
    }

    /// Sorted snapshot for display.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.roles
            .iter()
            .map(|(role, tokens)| {
                let mut tokens: Vec<String> = tokens.iter().cloned().collect();
                tokens.sort();
                (role.clone(), tokens)
            })
            .collect()
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_is_empty() {
        let table = RolePermissionTable::builtin();
        assert!(table.permissions_for("no-such-role").is_empty());
        assert!(table.permissions_for("").is_empty());
    }

    #[test]
    fn super_roles_carry_wildcard() {
        let table = RolePermissionTable::builtin();
        for role in roles::SUPER_ROLES {
            assert!(table.grants_wildcard(role), "{role} should hold *");
        }
        assert!(!table.grants_wildcard(roles::PATROL));
    }

    #[test]
    fn patrol_cannot_review_reports() {
        let table = RolePermissionTable::builtin();
        let patrol = table.permissions_for(roles::PATROL);
        assert!(!patrol.contains(ACCESS_ACTION_REPORTS));
        assert!(patrol.contains(MANAGE_OWN_ACTION_REPORTS));
    }

    #[test]
    fn role_names_are_exact_strings() {
        let table = RolePermissionTable::builtin();
        assert!(table.permissions_for("ADMIN").is_empty());
        assert!(table.permissions_for(" admin").is_empty());
    }

    #[test]
    fn json_override_replaces_builtin() {
        let table = RolePermissionTable::from_json(r#"{"סייר": ["vehicle_use_system"]}"#).unwrap();
        let patrol = table.permissions_for(roles::PATROL);
        assert_eq!(patrol.len(), 1);
        assert!(patrol.contains(VEHICLE_USE_SYSTEM));
        assert!(table.permissions_for(roles::ADMIN).is_empty());
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = RolePermissionTable::from_json("[1,2]").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}

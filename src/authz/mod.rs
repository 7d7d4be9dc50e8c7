//! Authorization module - role table, policy evaluator and guards
//!
//! This module implements the capability model:
//! - Static role -> capability token table (with `*` wildcard for super-roles)
//! - Explicit per-user grants (soft-revocable)
//! - OR evaluation across a list of required tokens
//! - Route/action guards that fail closed

mod evaluator;
mod guard;
mod principal;
mod table;

pub use evaluator::{DefaultPolicyEvaluator, PolicyEvaluator, RequiredPermission};
pub use guard::{ActionGuard, Denial, GuardState, RouteDecision, RouteGuard, LOGIN_PATH};
pub use principal::Principal;
pub use table::RolePermissionTable;

/// Token granting every capability. Only ever attached to super-roles.
pub const WILDCARD: &str = "*";

/// Well-known role names. Compared as exact strings, never translated.
pub mod roles {
    pub const DEVELOPER: &str = "מפתח";
    pub const ADMIN: &str = "אדמין";
    pub const LEGACY_ADMIN: &str = "admin";
    pub const UNIT_COMMAND: &str = "פיקוד יחידה";
    pub const DISPATCH_COMMANDER: &str = "מפקד משל\"ט";
    pub const DISPATCHER: &str = "מוקדן";
    pub const PATROL: &str = "סייר";

    pub const SUPER_ROLES: [&str; 3] = [DEVELOPER, ADMIN, LEGACY_ADMIN];

    pub fn is_super_role(role: &str) -> bool {
        SUPER_ROLES.contains(&role)
    }
}

/// Capability tokens observed in use. The set is open; unknown tokens are legal.
pub mod permissions {
    pub const VIEW_DASHBOARD_EVENTS: &str = "view_dashboard_events";
    pub const VIEW_USERS_INFO: &str = "view_users_info";
    pub const VIEW_EVENTS_LIST: &str = "view_events_list";
    pub const ACCESS_ANALYTICS: &str = "access_analytics";
    pub const MANAGE_OWN_ACTION_REPORTS: &str = "manage_own_action_reports";
    pub const ACCESS_ACTION_REPORTS: &str = "access_action_reports";
    pub const ACCESS_SUMMARIES: &str = "access_summaries";
    pub const VIEW_OWN_SUMMARIES: &str = "view_own_summaries";
    pub const CAN_MODIFY_PRIVILEGES: &str = "can_modify_privileges";
    pub const VEHICLE_USE_SYSTEM: &str = "vehicle_use_system";
    pub const VEHICLE_SEARCH_ACCESS: &str = "vehicle_search_access";
    pub const MANAGE_EVENTS: &str = "manage_events";
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// One explicit capability grant. Revocation flips `is_active`; rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "access_action_reports")]
    pub permission: String,
    pub is_active: bool,
    pub granted_by_id: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Loggable for PermissionGrant {
    fn entity_type() -> &'static str { "user_permission" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPermissionRequest {
    #[schema(example = "access_action_reports")]
    pub permission: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub role: String,
    pub is_super_role: bool,
    /// Tokens coming from the role table
    pub role_permissions: Vec<String>,
    /// Active explicit grants
    pub explicit_permissions: Vec<String>,
}

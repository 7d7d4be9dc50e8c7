use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

/// Links a volunteer to an event, which is what allows them to file a report for it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventAssignment {
    pub event_id: String,
    pub volunteer_id: Uuid,
    pub assigned_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for EventAssignment {
    fn entity_type() -> &'static str { "event_assignment" }
    fn subject_id(&self) -> Uuid { self.volunteer_id }
}

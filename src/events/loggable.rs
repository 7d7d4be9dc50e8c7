use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an audit entry; drives retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Privilege and account changes. Never auto-deleted.
    Critical,
    #[default]
    Important,
    /// Logins and other chatter, trimmed aggressively.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can appear in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. `action_report` in `action_report.approved`
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "revoked" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

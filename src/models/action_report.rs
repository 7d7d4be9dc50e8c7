use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// Lifecycle state of an action report.
///
/// `Draft` exists only on the client; the first persisted state is `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
            ReportStatus::UnderReview => "under_review",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Label stored in `action_reports.status`.
    pub fn db_label(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "טיוטה",
            ReportStatus::Submitted => "הוגש",
            ReportStatus::UnderReview => "נבדק",
            ReportStatus::Approved => "אושר",
            ReportStatus::Rejected => "נדחה",
        }
    }

    pub fn from_db_label(label: &str) -> Result<Self, AppError> {
        match label.trim() {
            "הוגש" | "submitted" => Ok(ReportStatus::Submitted),
            "נבדק" | "under_review" => Ok(ReportStatus::UnderReview),
            "אושר" | "approved" => Ok(ReportStatus::Approved),
            "נדחה" | "rejected" => Ok(ReportStatus::Rejected),
            "טיוטה" | "draft" => Err(AppError::internal("draft reports are never persisted")),
            other => Err(AppError::internal(format!("unknown report status: {other}"))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Approved)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields the owning volunteer writes. Reviewers never touch these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportContent {
    #[serde(default)]
    pub has_partner: bool,
    pub partner_name: Option<String>,
    pub partner_id_number: Option<String>,
    pub partner_phone: Option<String>,
    #[serde(default)]
    #[schema(example = "נהג")]
    pub volunteer_role: String,
    #[serde(default)]
    #[schema(example = "Arrived on scene at 21:40, secured the area until police arrived.")]
    pub full_report: String,
    #[serde(default)]
    pub digital_signature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionReport {
    pub id: Uuid,
    pub event_id: String,
    pub volunteer_id: Uuid,
    pub status: ReportStatus,
    #[serde(flatten)]
    pub content: ReportContent,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for ActionReport {
    fn entity_type() -> &'static str { "action_report" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Important }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    #[serde(default)]
    #[schema(example = "evt-2025-0142")]
    pub event_id: String,
    #[serde(flatten)]
    pub content: ReportContent,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewRequest {
    #[schema(example = "Missing arrival time")]
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportListQuery {
    /// Filter by status (snake_case name)
    pub status: Option<ReportStatus>,
}

/// Store-level filter for listing reports.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub volunteer_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_labels_round_trip() {
        for status in [
            ReportStatus::Submitted,
            ReportStatus::UnderReview,
            ReportStatus::Approved,
            ReportStatus::Rejected,
        ] {
            assert_eq!(ReportStatus::from_db_label(status.db_label()).unwrap(), status);
        }
    }

    #[test]
    fn draft_is_not_a_persisted_label() {
        assert!(ReportStatus::from_db_label("טיוטה").is_err());
    }

    #[test]
    fn only_approved_is_terminal() {
        assert!(ReportStatus::Approved.is_terminal());
        assert!(!ReportStatus::Rejected.is_terminal());
    }

    #[test]
    fn api_uses_snake_case_names() {
        let json = serde_json::to_string(&ReportStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
    }
}

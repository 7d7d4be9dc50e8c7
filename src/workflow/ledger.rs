use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::Principal;
use crate::models::action_report::ActionReport;

use super::state_machine::{next_status, ReportEvent};
use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn event(&self) -> ReportEvent {
        match self {
            ReviewDecision::Approve => ReportEvent::Approve,
            ReviewDecision::Reject => ReportEvent::Reject,
        }
    }
}

/// Applies a review decision to `report`, returning the updated copy.
///
/// Only the latest review is kept: status, reviewer, timestamp and notes are
/// replaced together. The caller persists the result in a single update.
pub fn record_review(
    report: &ActionReport,
    reviewer: &Principal,
    decision: ReviewDecision,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<ActionReport, WorkflowError> {
    let status = next_status(report.status, decision.event())?;

    let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if decision == ReviewDecision::Reject && notes.is_none() {
        return Err(WorkflowError::validation(
            "review_notes",
            "a rejection must explain what needs fixing",
        ));
    }

    let mut updated = report.clone();
    updated.status = status;
    updated.reviewed_by = Some(reviewer.user_id);
    updated.reviewed_at = Some(now);
    updated.review_notes = notes;
    updated.updated_at = now;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles;
    use crate::models::action_report::{ReportContent, ReportStatus};
    use uuid::Uuid;

    fn report(status: ReportStatus) -> ActionReport {
        let now = Utc::now();
        ActionReport {
            id: Uuid::new_v4(),
            event_id: "evt-1".to_string(),
            volunteer_id: Uuid::new_v4(),
            status,
            content: ReportContent {
                volunteer_role: "סייר".to_string(),
                full_report: "text".to_string(),
                digital_signature: true,
                ..Default::default()
            },
            review_notes: Some("older note".to_string()),
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn approve_without_notes_sets_every_review_field() {
        let reviewer = Principal::new(Uuid::new_v4(), roles::UNIT_COMMAND);
        let now = Utc::now();
        let updated = record_review(&report(ReportStatus::Submitted), &reviewer, ReviewDecision::Approve, None, now)
            .unwrap();

        assert_eq!(updated.status, ReportStatus::Approved);
        assert_eq!(updated.reviewed_by, Some(reviewer.user_id));
        assert_eq!(updated.reviewed_at, Some(now));
        assert_eq!(updated.review_notes, None);
    }

    #[test]
    fn reject_with_blank_notes_is_validation_error() {
        let reviewer = Principal::new(Uuid::new_v4(), roles::UNIT_COMMAND);
        for notes in [None, Some(String::new()), Some("  \n".to_string())] {
            let err = record_review(
                &report(ReportStatus::UnderReview),
                &reviewer,
                ReviewDecision::Reject,
                notes,
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, WorkflowError::Validation { field: "review_notes", .. }));
        }
    }

    #[test]
    fn reject_keeps_trimmed_notes() {
        let reviewer = Principal::new(Uuid::new_v4(), roles::UNIT_COMMAND);
        let updated = record_review(
            &report(ReportStatus::Submitted),
            &reviewer,
            ReviewDecision::Reject,
            Some("  add partner phone ".to_string()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(updated.status, ReportStatus::Rejected);
        assert_eq!(updated.review_notes.as_deref(), Some("add partner phone"));
    }

    #[test]
    fn approved_report_cannot_be_reviewed_again() {
        let reviewer = Principal::new(Uuid::new_v4(), roles::ADMIN);
        for decision in [ReviewDecision::Approve, ReviewDecision::Reject] {
            let err = record_review(
                &report(ReportStatus::Approved),
                &reviewer,
                decision,
                Some("late".to_string()),
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        }
    }
}

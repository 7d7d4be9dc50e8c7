use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::authz::permissions::{ACCESS_ACTION_REPORTS, MANAGE_OWN_ACTION_REPORTS};
use crate::authz::{PolicyEvaluator, Principal};
use crate::models::action_report::{ReportContent, ReportStatus};

use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportEvent {
    Submit,
    OpenForReview,
    Approve,
    Reject,
    Resubmit,
}

impl ReportEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportEvent::Submit => "submit",
            ReportEvent::OpenForReview => "open for review",
            ReportEvent::Approve => "approve",
            ReportEvent::Reject => "reject",
            ReportEvent::Resubmit => "resubmit",
        }
    }

    pub fn is_review(&self) -> bool {
        matches!(self, ReportEvent::OpenForReview | ReportEvent::Approve | ReportEvent::Reject)
    }
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. Anything not listed is refused.
pub fn next_status(from: ReportStatus, event: ReportEvent) -> Result<ReportStatus, WorkflowError> {
    use ReportEvent::*;
    use ReportStatus::*;

    match (from, event) {
        (Draft, Submit) => Ok(Submitted),
        (Submitted | UnderReview, OpenForReview) => Ok(UnderReview),
        (Submitted | UnderReview, Approve) => Ok(Approved),
        (Submitted | UnderReview, Reject) => Ok(Rejected),
        (Rejected, Resubmit) => Ok(Submitted),
        _ => Err(WorkflowError::InvalidTransition { from, event }),
    }
}

/// Actor check for `event` on a report owned by `owner`.
///
/// Review events need `access_action_reports`. Submit needs the caller to be the
/// owner and to hold `manage_own_action_reports`. Resubmit is owner-only.
pub fn authorize_event(
    evaluator: &dyn PolicyEvaluator,
    actor: &Principal,
    owner: Uuid,
    event: ReportEvent,
) -> Result<(), WorkflowError> {
    match event {
        ReportEvent::OpenForReview | ReportEvent::Approve | ReportEvent::Reject => {
            if evaluator.has_permission(Some(actor), ACCESS_ACTION_REPORTS) {
                Ok(())
            } else {
                Err(WorkflowError::Unauthorized(format!(
                    "{ACCESS_ACTION_REPORTS} is required to {event} a report"
                )))
            }
        }
        ReportEvent::Submit => {
            if actor.user_id != owner {
                return Err(WorkflowError::Unauthorized(
                    "reports can only be filed by the volunteer they belong to".to_string(),
                ));
            }
            if !evaluator.has_permission(Some(actor), MANAGE_OWN_ACTION_REPORTS) {
                return Err(WorkflowError::Unauthorized(format!(
                    "{MANAGE_OWN_ACTION_REPORTS} is required to file a report"
                )));
            }
            Ok(())
        }
        ReportEvent::Resubmit => {
            if actor.user_id == owner {
                Ok(())
            } else {
                Err(WorkflowError::Unauthorized(
                    "only the owning volunteer may resubmit a report".to_string(),
                ))
            }
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Content checks applied on submit and resubmit.
pub fn validate_content(content: &ReportContent) -> Result<(), WorkflowError> {
    if content.full_report.trim().is_empty() {
        return Err(WorkflowError::validation("full_report", "the report text must not be empty"));
    }
    if !content.digital_signature {
        return Err(WorkflowError::validation(
            "digital_signature",
            "the report must be signed before it is submitted",
        ));
    }
    if content.has_partner && is_blank(content.partner_name.as_deref()) {
        return Err(WorkflowError::validation(
            "partner_name",
            "a partner name is required when has_partner is set",
        ));
    }
    Ok(())
}

/// Drops partner fields when there is no partner so stale values are not persisted.
pub fn normalize_content(mut content: ReportContent) -> ReportContent {
    if !content.has_partner {
        content.partner_name = None;
        content.partner_id_number = None;
        content.partner_phone = None;
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{roles, DefaultPolicyEvaluator};

    const ALL_STATES: [ReportStatus; 5] = [
        ReportStatus::Draft,
        ReportStatus::Submitted,
        ReportStatus::UnderReview,
        ReportStatus::Approved,
        ReportStatus::Rejected,
    ];

    const ALL_EVENTS: [ReportEvent; 5] = [
        ReportEvent::Submit,
        ReportEvent::OpenForReview,
        ReportEvent::Approve,
        ReportEvent::Reject,
        ReportEvent::Resubmit,
    ];

    fn signed(text: &str) -> ReportContent {
        ReportContent {
            volunteer_role: "נהג".to_string(),
            full_report: text.to_string(),
            digital_signature: true,
            ..Default::default()
        }
    }

    #[test]
    fn approved_accepts_nothing() {
        for event in ALL_EVENTS {
            assert_eq!(
                next_status(ReportStatus::Approved, event),
                Err(WorkflowError::InvalidTransition { from: ReportStatus::Approved, event })
            );
        }
    }

    #[test]
    fn rejected_only_accepts_resubmit() {
        for event in ALL_EVENTS {
            let result = next_status(ReportStatus::Rejected, event);
            if event == ReportEvent::Resubmit {
                assert_eq!(result, Ok(ReportStatus::Submitted));
            } else {
                assert!(result.is_err(), "{event} should be refused on rejected");
            }
        }
    }

    #[test]
    fn review_events_apply_from_submitted_and_under_review() {
        for from in [ReportStatus::Submitted, ReportStatus::UnderReview] {
            assert_eq!(next_status(from, ReportEvent::OpenForReview), Ok(ReportStatus::UnderReview));
            assert_eq!(next_status(from, ReportEvent::Approve), Ok(ReportStatus::Approved));
            assert_eq!(next_status(from, ReportEvent::Reject), Ok(ReportStatus::Rejected));
        }
    }

    #[test]
    fn submit_only_from_draft() {
        for from in ALL_STATES {
            let result = next_status(from, ReportEvent::Submit);
            if from == ReportStatus::Draft {
                assert_eq!(result, Ok(ReportStatus::Submitted));
            } else {
                assert!(result.is_err());
            }
        }
    }

    #[test]
    fn unsigned_report_fails_validation() {
        let mut content = signed("text");
        content.digital_signature = false;
        let err = validate_content(&content).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { field: "digital_signature", .. }));
    }

    #[test]
    fn blank_report_fails_validation() {
        let err = validate_content(&signed("   ")).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { field: "full_report", .. }));
    }

    #[test]
    fn volunteer_role_is_not_a_submit_guard() {
        let mut content = signed("text");
        content.volunteer_role.clear();
        assert!(validate_content(&content).is_ok());
    }

    #[test]
    fn partner_name_required_with_partner() {
        let mut content = signed("text");
        content.has_partner = true;
        let err = validate_content(&content).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { field: "partner_name", .. }));

        content.partner_name = Some("Dana".to_string());
        assert!(validate_content(&content).is_ok());
    }

    #[test]
    fn normalize_drops_partner_fields_without_partner() {
        let mut content = signed("text");
        content.partner_phone = Some("050".to_string());
        assert_eq!(normalize_content(content).partner_phone, None);
    }

    #[test]
    fn resubmit_is_owner_only() {
        let evaluator = DefaultPolicyEvaluator::default();
        let owner = Principal::new(Uuid::new_v4(), roles::PATROL);
        let admin = Principal::new(Uuid::new_v4(), roles::ADMIN);

        assert!(authorize_event(&evaluator, &owner, owner.user_id, ReportEvent::Resubmit).is_ok());
        assert!(matches!(
            authorize_event(&evaluator, &admin, owner.user_id, ReportEvent::Resubmit),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn review_events_need_report_access() {
        let evaluator = DefaultPolicyEvaluator::default();
        let patrol = Principal::new(Uuid::new_v4(), roles::PATROL);
        let commander = Principal::new(Uuid::new_v4(), roles::UNIT_COMMAND);
        let owner = Uuid::new_v4();

        for event in ALL_EVENTS.into_iter().filter(ReportEvent::is_review) {
            assert!(authorize_event(&evaluator, &patrol, owner, event).is_err());
            assert!(authorize_event(&evaluator, &commander, owner, event).is_ok());
        }
    }

    #[test]
    fn submit_for_someone_else_is_refused() {
        let evaluator = DefaultPolicyEvaluator::default();
        let patrol = Principal::new(Uuid::new_v4(), roles::PATROL);
        assert!(authorize_event(&evaluator, &patrol, Uuid::new_v4(), ReportEvent::Submit).is_err());
        assert!(authorize_event(&evaluator, &patrol, patrol.user_id, ReportEvent::Submit).is_ok());
    }
}

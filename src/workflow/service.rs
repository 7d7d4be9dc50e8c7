use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::permissions::{ACCESS_ACTION_REPORTS, ACCESS_SUMMARIES};
use crate::authz::{PolicyEvaluator, Principal};
use crate::db::ReportStore;
use crate::errors::{AppError, AppResult};
use crate::models::action_report::{ActionReport, CreateReportRequest, ReportContent, ReportFilter, ReportStatus};

use super::ledger::{record_review, ReviewDecision};
use super::state_machine::{authorize_event, next_status, normalize_content, validate_content, ReportEvent};
use super::WorkflowError;

/// Result of a status change, carrying the state it came from.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: ReportStatus,
    pub report: ActionReport,
}

/// Loads the principal for `user_id`. Missing or deactivated users resolve to `None`.
pub async fn resolve_principal(store: &dyn ReportStore, user_id: Uuid) -> AppResult<Option<Principal>> {
    let Some(user) = store.get_user_by_id(user_id).await? else {
        return Ok(None);
    };
    if !user.is_active {
        tracing::debug!(user_id = %user_id, "inactive user treated as unauthenticated");
        return Ok(None);
    }

    let grants = store.list_active_permissions(user_id).await?;
    Ok(Some(Principal::new(user.id, user.role).with_permissions(grants)))
}

/// Drives action-report transitions against a store.
///
/// Order of checks for every operation: actor permission, report lookup,
/// transition table, field validation, then a single compare-and-swap write.
/// Nothing is written unless every check passed.
pub struct ReportWorkflow<'a> {
    store: &'a dyn ReportStore,
    evaluator: &'a dyn PolicyEvaluator,
}

impl<'a> ReportWorkflow<'a> {
    pub fn new(store: &'a dyn ReportStore, evaluator: &'a dyn PolicyEvaluator) -> Self {
        Self { store, evaluator }
    }

    async fn load(&self, id: Uuid) -> AppResult<ActionReport> {
        self.store
            .get_report_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("action report not found"))
    }

    async fn persist(&self, report: &ActionReport, expected: ReportStatus) -> AppResult<()> {
        if self.store.update_report(report, expected).await? {
            Ok(())
        } else {
            Err(AppError::conflict(
                "the report was changed by someone else; reload it and try again",
            ))
        }
    }

    fn is_reviewer(&self, actor: &Principal) -> bool {
        self.evaluator.has_permission(Some(actor), ACCESS_ACTION_REPORTS)
    }

    pub async fn create_and_submit(
        &self,
        actor: &Principal,
        request: CreateReportRequest,
        now: DateTime<Utc>,
    ) -> AppResult<ActionReport> {
        authorize_event(self.evaluator, actor, actor.user_id, ReportEvent::Submit)?;

        let event_id = request.event_id.trim().to_string();
        if event_id.is_empty() {
            return Err(WorkflowError::validation("event_id", "event_id is required").into());
        }

        let content = normalize_content(request.content);
        validate_content(&content)?;

        if !self.store.is_volunteer_assigned(&event_id, actor.user_id).await? {
            return Err(AppError::unauthorized("you are not assigned to this event"));
        }

        let status = next_status(ReportStatus::Draft, ReportEvent::Submit)?;
        let report = ActionReport {
            id: Uuid::new_v4(),
            event_id,
            volunteer_id: actor.user_id,
            status,
            content,
            review_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_report(&report).await?;

        tracing::info!(
            report_id = %report.id,
            actor = %actor.user_id,
            event_id = %report.event_id,
            to = %report.status,
            "action report submitted"
        );
        Ok(report)
    }

    /// Owner or reviewer may read; summary readers may also read approved reports.
    pub async fn get(&self, actor: &Principal, id: Uuid) -> AppResult<ActionReport> {
        let report = self.load(id).await?;

        let allowed = report.volunteer_id == actor.user_id
            || self.is_reviewer(actor)
            || (report.status == ReportStatus::Approved
                && self.evaluator.has_permission(Some(actor), ACCESS_SUMMARIES));

        if !allowed {
            return Err(AppError::unauthorized("you may not read this report"));
        }
        Ok(report)
    }

    /// Reviewers see every report; everyone else sees only their own.
    pub async fn list(&self, actor: &Principal, status: Option<ReportStatus>) -> AppResult<Vec<ActionReport>> {
        let filter = ReportFilter {
            status,
            volunteer_id: if self.is_reviewer(actor) { None } else { Some(actor.user_id) },
        };
        self.store.list_reports(&filter).await
    }

    pub async fn open_for_review(&self, actor: &Principal, id: Uuid, now: DateTime<Utc>) -> AppResult<Transition> {
        let report = self.load(id).await?;
        authorize_event(self.evaluator, actor, report.volunteer_id, ReportEvent::OpenForReview)?;

        let from = report.status;
        let to = next_status(from, ReportEvent::OpenForReview)?;
        if to == from {
            return Ok(Transition { from, report });
        }

        let mut updated = report;
        updated.status = to;
        updated.updated_at = now;
        self.persist(&updated, from).await?;

        tracing::info!(report_id = %id, actor = %actor.user_id, from = %from, to = %to, "action report under review");
        Ok(Transition { from, report: updated })
    }

    pub async fn review(
        &self,
        actor: &Principal,
        id: Uuid,
        decision: ReviewDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        let report = self.load(id).await?;
        authorize_event(self.evaluator, actor, report.volunteer_id, decision.event())?;

        let from = report.status;
        let updated = record_review(&report, actor, decision, notes, now)?;
        self.persist(&updated, from).await?;

        tracing::info!(
            report_id = %id,
            actor = %actor.user_id,
            from = %from,
            to = %updated.status,
            "action report reviewed"
        );
        Ok(Transition { from, report: updated })
    }

    pub async fn approve(
        &self,
        actor: &Principal,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        self.review(actor, id, ReviewDecision::Approve, notes, now).await
    }

    pub async fn reject(
        &self,
        actor: &Principal,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        self.review(actor, id, ReviewDecision::Reject, notes, now).await
    }

    /// Owner edits a rejected report and sends it back. The last review stays
    /// on the row until the next decision overwrites it.
    pub async fn resubmit(
        &self,
        actor: &Principal,
        id: Uuid,
        content: ReportContent,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        let report = self.load(id).await?;
        authorize_event(self.evaluator, actor, report.volunteer_id, ReportEvent::Resubmit)?;

        let from = report.status;
        let to = next_status(from, ReportEvent::Resubmit)?;

        let content = normalize_content(content);
        validate_content(&content)?;

        let mut updated = report;
        updated.status = to;
        updated.content = content;
        updated.updated_at = now;
        self.persist(&updated, from).await?;

        tracing::info!(report_id = %id, actor = %actor.user_id, from = %from, to = %to, "action report resubmitted");
        Ok(Transition { from, report: updated })
    }
}

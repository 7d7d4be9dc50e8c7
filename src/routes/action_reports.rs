//! Action-report lifecycle over HTTP.
//!
//! Handlers are thin: the workflow decides who may do what and which
//! transitions exist; this layer maps results to status codes and publishes
//! activity events.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::permissions::{ACCESS_ACTION_REPORTS, MANAGE_OWN_ACTION_REPORTS};
use crate::authz::ActionGuard;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::extract::{AppJson, OptionalJson};
use crate::jwt::CurrentUser;
use crate::models::action_report::{ActionReport, CreateReportRequest, ReportContent, ReportListQuery, ReviewRequest};
use crate::utils::utc_now;
use crate::workflow::service::Transition;

fn publish(state: &AppState, headers: &HeaderMap, action: &str, actor: Uuid, transition: &Transition) {
    let old = ActionReport {
        status: transition.from,
        ..transition.report.clone()
    };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(actor),
        &transition.report,
        Some(&old),
        Some(RequestContext::from_headers(headers)),
    );
}

#[utoipa::path(
    get,
    path = "/action-reports",
    tag = "Action Reports",
    params(ReportListQuery),
    responses(
        (status = 200, description = "Reports visible to the caller", body = [ActionReport]),
        (status = 403, description = "Caller can neither review nor file reports")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Json<Vec<ActionReport>>> {
    ActionGuard::new([ACCESS_ACTION_REPORTS, MANAGE_OWN_ACTION_REPORTS])
        .authorize(state.evaluator.as_ref(), Some(&principal))?;

    let reports = state.workflow().list(&principal, query.status).await?;
    Ok(Json(reports))
}

#[utoipa::path(
    post,
    path = "/action-reports",
    tag = "Action Reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report submitted", body = ActionReport),
        (status = 403, description = "Not allowed to file reports, or not assigned to the event"),
        (status = 409, description = "A report for this event already exists"),
        (status = 422, description = "Missing required field")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<ActionReport>)> {
    let report = state.workflow().create_and_submit(&principal, payload, utc_now()).await?;

    log_activity_with_context(
        &state.event_bus,
        "submitted",
        Some(principal.user_id),
        &report,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/action-reports/{id}",
    tag = "Action Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report detail", body = ActionReport),
        (status = 404, description = "Report not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionReport>> {
    Ok(Json(state.workflow().get(&principal, id).await?))
}

#[utoipa::path(
    post,
    path = "/action-reports/{id}/review",
    tag = "Action Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report is under review", body = ActionReport),
        (status = 409, description = "Report cannot be opened from its current status")
    ),
    security(("bearerAuth" = []))
)]
pub async fn open_for_review(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionReport>> {
    let transition = state.workflow().open_for_review(&principal, id, utc_now()).await?;

    if transition.from != transition.report.status {
        publish(&state, &headers, "under_review", principal.user_id, &transition);
    }

    Ok(Json(transition.report))
}

#[utoipa::path(
    post,
    path = "/action-reports/{id}/approve",
    tag = "Action Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Report approved", body = ActionReport),
        (status = 400, description = "Body present but not JSON, or sent without a JSON content type"),
        (status = 409, description = "Report is not awaiting a decision")
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve_report(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    OptionalJson(payload): OptionalJson<ReviewRequest>,
) -> AppResult<Json<ActionReport>> {
    let notes = payload.and_then(|body| body.review_notes);
    let transition = state.workflow().approve(&principal, id, notes, utc_now()).await?;

    publish(&state, &headers, "approved", principal.user_id, &transition);
    Ok(Json(transition.report))
}

#[utoipa::path(
    post,
    path = "/action-reports/{id}/reject",
    tag = "Action Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Report rejected", body = ActionReport),
        (status = 409, description = "Report is not awaiting a decision"),
        (status = 422, description = "review_notes is required when rejecting")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject_report(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> AppResult<Json<ActionReport>> {
    let transition = state
        .workflow()
        .reject(&principal, id, payload.review_notes, utc_now())
        .await?;

    publish(&state, &headers, "rejected", principal.user_id, &transition);
    Ok(Json(transition.report))
}

#[utoipa::path(
    put,
    path = "/action-reports/{id}",
    tag = "Action Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = ReportContent,
    responses(
        (status = 200, description = "Report edited and resubmitted", body = ActionReport),
        (status = 403, description = "Only the author may resubmit"),
        (status = 409, description = "Only rejected reports can be resubmitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn resubmit_report(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ReportContent>,
) -> AppResult<Json<ActionReport>> {
    let transition = state.workflow().resubmit(&principal, id, payload, utc_now()).await?;

    publish(&state, &headers, "resubmitted", principal.user_id, &transition);
    Ok(Json(transition.report))
}

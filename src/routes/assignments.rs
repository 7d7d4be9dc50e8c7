use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::permissions::MANAGE_EVENTS;
use crate::authz::ActionGuard;
use crate::db::assignments as repo;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::CurrentUser;
use crate::models::assignment::EventAssignment;

#[utoipa::path(
    get,
    path = "/events/{event_id}/volunteers",
    tag = "Assignments",
    params(("event_id" = String, Path, description = "Event identifier")),
    responses((status = 200, description = "Volunteers assigned to the event", body = [EventAssignment])),
    security(("bearerAuth" = []))
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(event_id): Path<String>,
) -> AppResult<Json<Vec<EventAssignment>>> {
    ActionGuard::new(MANAGE_EVENTS).authorize(state.evaluator.as_ref(), Some(&principal))?;
    Ok(Json(repo::list_assignments(&state.pool, &event_id).await?))
}

#[utoipa::path(
    put,
    path = "/events/{event_id}/volunteers/{user_id}",
    tag = "Assignments",
    params(
        ("event_id" = String, Path, description = "Event identifier"),
        ("user_id" = Uuid, Path, description = "Volunteer id")
    ),
    responses(
        (status = 201, description = "Volunteer assigned", body = EventAssignment),
        (status = 200, description = "Already assigned", body = EventAssignment)
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_volunteer(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path((event_id, user_id)): Path<(String, Uuid)>,
) -> AppResult<(StatusCode, Json<EventAssignment>)> {
    ActionGuard::new(MANAGE_EVENTS)
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let (assignment, created) =
                repo::assign_volunteer(&state.pool, &event_id, user_id, principal.user_id).await?;

            if !created {
                return Ok((StatusCode::OK, Json(assignment)));
            }

            log_activity_with_context(
                &state.event_bus,
                "assigned",
                Some(principal.user_id),
                &assignment,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
            Ok((StatusCode::CREATED, Json(assignment)))
        })
        .await
}

#[utoipa::path(
    delete,
    path = "/events/{event_id}/volunteers/{user_id}",
    tag = "Assignments",
    params(
        ("event_id" = String, Path, description = "Event identifier"),
        ("user_id" = Uuid, Path, description = "Volunteer id")
    ),
    responses(
        (status = 204, description = "Volunteer removed from the event"),
        (status = 404, description = "Not assigned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn unassign_volunteer(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path((event_id, user_id)): Path<(String, Uuid)>,
) -> AppResult<StatusCode> {
    ActionGuard::new(MANAGE_EVENTS)
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let removed = repo::unassign_volunteer(&state.pool, &event_id, user_id).await?;
            log_activity_with_context(
                &state.event_bus,
                "unassigned",
                Some(principal.user_id),
                &removed,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
            Ok(StatusCode::NO_CONTENT)
        })
        .await
}

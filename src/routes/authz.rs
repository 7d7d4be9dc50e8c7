use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{PolicyEvaluator, RequiredPermission, RouteDecision, RouteGuard};
use crate::errors::{AppError, AppResult};
use crate::extract::AppJson;
use crate::jwt::{CurrentUser, MaybeUser};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckRequest {
    /// A single token or a list of alternatives (OR)
    #[schema(value_type = Object, example = json!(["access_summaries", "view_own_summaries"]))]
    pub required: RequiredPermission,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteRequest {
    #[schema(value_type = Object, example = json!("access_action_reports"))]
    pub required: RequiredPermission,
    /// Where an authenticated but unauthorized user is sent
    #[schema(example = "/dashboard")]
    pub fallback: String,
}

#[utoipa::path(
    post,
    path = "/authz/check",
    tag = "Authz",
    request_body = CheckRequest,
    responses((status = 200, description = "Whether the caller holds any of the tokens", body = CheckResponse))
)]
pub async fn check(
    State(state): State<AppState>,
    MaybeUser(principal): MaybeUser,
    AppJson(payload): AppJson<CheckRequest>,
) -> AppResult<Json<CheckResponse>> {
    let allowed = state.evaluator.has_any_permission(principal.as_ref(), &payload.required);
    Ok(Json(CheckResponse { allowed }))
}

#[utoipa::path(
    post,
    path = "/authz/route",
    tag = "Authz",
    request_body = RouteRequest,
    responses((status = 200, description = "Render or redirect decision for a protected view", body = RouteDecision))
)]
pub async fn route_decision(
    State(state): State<AppState>,
    MaybeUser(principal): MaybeUser,
    AppJson(payload): AppJson<RouteRequest>,
) -> AppResult<Json<RouteDecision>> {
    if payload.fallback.trim().is_empty() {
        return Err(AppError::validation("fallback", "fallback route is required"));
    }

    let guard = RouteGuard::new(payload.required, payload.fallback);
    Ok(Json(guard.decide(state.evaluator.as_ref(), principal.as_ref())))
}

#[utoipa::path(
    get,
    path = "/authz/roles",
    tag = "Authz",
    responses((status = 200, description = "Role to permission table in effect", body = BTreeMap<String, Vec<String>>)),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(_principal): CurrentUser,
) -> AppResult<Json<BTreeMap<String, Vec<String>>>> {
    Ok(Json(state.evaluator.table().snapshot()))
}

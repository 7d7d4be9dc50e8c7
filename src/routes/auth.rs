use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::db::users::{fetch_user_by_id, find_user_by_email};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::extract::AppJson;
use crate::jwt::{AuthUser, CurrentUser};
use crate::models::user::{AuthResponse, LoginRequest, MeResponse, User};
use crate::utils::verify_password;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or deactivated account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthenticated("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    if !db_user.is_active {
        return Err(AppError::unauthenticated("account is deactivated"));
    }

    let token = state.jwt.encode(db_user.id)?;
    let user: User = db_user.try_into()?;

    log_activity(&state.event_bus, "login", Some(user.id), &user);

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user and effective permissions", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, CurrentUser(principal): CurrentUser) -> AppResult<Json<MeResponse>> {
    let user: User = fetch_user_by_id(&state.pool, principal.user_id).await?.try_into()?;
    let permissions = state.evaluator.effective_permissions(&principal);

    Ok(Json(MeResponse {
        user,
        permissions,
        is_super_role: principal.is_super_role(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

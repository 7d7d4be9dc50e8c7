//! User provisioning and privilege administration.
//!
//! Every endpoint here requires `can_modify_privileges`. Privilege changes are
//! logged to the activity log with Critical severity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::permissions::CAN_MODIFY_PRIVILEGES;
use crate::authz::{roles, ActionGuard, Principal};
use crate::db::users as repo;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::extract::AppJson;
use crate::jwt::CurrentUser;
use crate::models::permission::{EffectivePermissions, GrantPermissionRequest, PermissionGrant};
use crate::models::user::{ProvisionUserRequest, UpdateRoleRequest, User};

fn privileges_guard() -> ActionGuard {
    ActionGuard::new(CAN_MODIFY_PRIVILEGES)
}

fn authorize(state: &AppState, principal: &Principal) -> AppResult<()> {
    privileges_guard().authorize(state.evaluator.as_ref(), Some(principal))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = ProvisionUserRequest,
    responses(
        (status = 201, description = "User provisioned", body = User),
        (status = 403, description = "Missing can_modify_privileges"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn provision_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<ProvisionUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    privileges_guard()
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let user = repo::provision_user(&state.pool, &payload).await?;
            log_activity_with_context(
                &state.event_bus,
                "provisioned",
                Some(principal.user_id),
                &user,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
            Ok((StatusCode::CREATED, Json(user)))
        })
        .await
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    authorize(&state, &principal)?;
    let user: User = repo::fetch_user_by_id(&state.pool, id).await?.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses((status = 200, description = "Role changed", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateRoleRequest>,
) -> AppResult<Json<User>> {
    privileges_guard()
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let old: User = repo::fetch_user_by_id(&state.pool, id).await?.try_into()?;
            let user = repo::update_role(&state.pool, id, &payload.role).await?;
            log_activity_with_context(
                &state.event_bus,
                "role_changed",
                Some(principal.user_id),
                &user,
                Some(&old),
                Some(RequestContext::from_headers(&headers)),
            );
            Ok(Json(user))
        })
        .await
}

async fn set_active(
    state: &AppState,
    principal: &Principal,
    headers: &HeaderMap,
    id: Uuid,
    is_active: bool,
) -> AppResult<Json<User>> {
    privileges_guard()
        .run(state.evaluator.as_ref(), Some(principal), || async {
            let user = repo::set_active(&state.pool, id, is_active).await?;
            log_activity_with_context(
                &state.event_bus,
                if is_active { "activated" } else { "deactivated" },
                Some(principal.user_id),
                &user,
                None,
                Some(RequestContext::from_headers(headers)),
            );
            Ok(Json(user))
        })
        .await
}

#[utoipa::path(
    post,
    path = "/users/{id}/deactivate",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User deactivated", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    set_active(&state, &principal, &headers, id, false).await
}

#[utoipa::path(
    post,
    path = "/users/{id}/activate",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User reactivated", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn activate_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    set_active(&state, &principal, &headers, id, true).await
}

#[utoipa::path(
    get,
    path = "/users/{id}/permissions",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Grants, including revoked history", body = [PermissionGrant])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<PermissionGrant>>> {
    authorize(&state, &principal)?;
    Ok(Json(repo::list_grants(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/users/{id}/permissions",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = GrantPermissionRequest,
    responses(
        (status = 201, description = "Permission granted", body = PermissionGrant),
        (status = 409, description = "Already actively granted"),
        (status = 422, description = "Blank token, or `*`, which only super-roles carry")
    ),
    security(("bearerAuth" = []))
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<GrantPermissionRequest>,
) -> AppResult<(StatusCode, Json<PermissionGrant>)> {
    privileges_guard()
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let grant = repo::grant_permission(&state.pool, id, &payload.permission, principal.user_id).await?;
            log_activity_with_context(
                &state.event_bus,
                "granted",
                Some(principal.user_id),
                &grant,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
            Ok((StatusCode::CREATED, Json(grant)))
        })
        .await
}

#[utoipa::path(
    delete,
    path = "/users/{id}/permissions/{permission}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("permission" = String, Path, description = "Permission token")
    ),
    responses(
        (status = 200, description = "Grant soft-revoked", body = PermissionGrant),
        (status = 404, description = "No active grant")
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
    Path((id, permission)): Path<(Uuid, String)>,
) -> AppResult<Json<PermissionGrant>> {
    privileges_guard()
        .run(state.evaluator.as_ref(), Some(&principal), || async {
            let grant = repo::revoke_permission(&state.pool, id, &permission).await?;
            log_activity_with_context(
                &state.event_bus,
                "revoked",
                Some(principal.user_id),
                &grant,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
            Ok(Json(grant))
        })
        .await
}

#[utoipa::path(
    get,
    path = "/users/{id}/effective-permissions",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Effective permissions", body = EffectivePermissions)),
    security(("bearerAuth" = []))
)]
pub async fn effective_permissions(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    authorize(&state, &principal)?;

    let user: User = repo::fetch_user_by_id(&state.pool, id).await?.try_into()?;
    let explicit = state.store.list_active_permissions(id).await?;

    let mut role_permissions: Vec<String> = state
        .evaluator
        .table()
        .permissions_for(&user.role)
        .iter()
        .cloned()
        .collect();
    role_permissions.sort();

    // describes configuration, so deactivated accounts still report their role's reach
    let is_super_role = roles::is_super_role(&user.role) || state.evaluator.table().grants_wildcard(&user.role);

    Ok(Json(EffectivePermissions {
        user_id: user.id,
        role: user.role,
        is_super_role,
        role_permissions,
        explicit_permissions: explicit,
    }))
}

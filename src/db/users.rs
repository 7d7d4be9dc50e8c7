//! User and grant administration queries shared by the HTTP routes and the CLI.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::WILDCARD;
use crate::errors::{AppError, AppResult};
use crate::models::permission::PermissionGrant;
use crate::models::user::{DbUser, ProvisionUserRequest, User};
use crate::utils::hash_password;

use super::row_parsers;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, created_at, updated_at";
const GRANT_COLUMNS: &str = "id, user_id, permission, is_active, granted_by_id, granted_at, revoked_at";

pub async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    let row = sqlx::query(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_parsers::db_user_from_row(&r)).transpose()
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub async fn provision_user(pool: &SqlitePool, request: &ProvisionUserRequest) -> AppResult<User> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("email", "a valid email is required"));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name", "name is required"));
    }
    if request.role.trim().is_empty() {
        return Err(AppError::validation("role", "role is required"));
    }

    ensure_email_available(pool, &email).await?;

    let password_hash = hash_password(&request.password)?;
    let now = Utc::now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(request.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(&request.role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_user_by_id(pool, user_id).await?.try_into()
}

pub async fn update_role(pool: &SqlitePool, user_id: Uuid, role: &str) -> AppResult<User> {
    if role.trim().is_empty() {
        return Err(AppError::validation("role", "role is required"));
    }

    let affected = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role)
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    fetch_user_by_id(pool, user_id).await?.try_into()
}

pub async fn set_active(pool: &SqlitePool, user_id: Uuid, is_active: bool) -> AppResult<User> {
    let affected = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    fetch_user_by_id(pool, user_id).await?.try_into()
}

/// All grants for a user, newest first, including revoked history.
pub async fn list_grants(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<PermissionGrant>> {
    let sql = format!("SELECT {GRANT_COLUMNS} FROM user_permissions WHERE user_id = ? ORDER BY granted_at DESC");
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_parsers::permission_grant_from_row).collect()
}

pub async fn grant_permission(
    pool: &SqlitePool,
    user_id: Uuid,
    permission: &str,
    granted_by: Uuid,
) -> AppResult<PermissionGrant> {
    let permission = permission.trim();
    if permission.is_empty() {
        return Err(AppError::validation("permission", "permission token is required"));
    }
    if permission == WILDCARD {
        return Err(AppError::validation(
            "permission",
            "`*` is reserved for super-roles and cannot be granted to a user",
        ));
    }

    // user must exist
    fetch_user_by_id(pool, user_id).await?;

    let grant = PermissionGrant {
        id: Uuid::new_v4(),
        user_id,
        permission: permission.to_string(),
        is_active: true,
        granted_by_id: Some(granted_by),
        granted_at: Utc::now(),
        revoked_at: None,
    };

    let result = sqlx::query(
        "INSERT INTO user_permissions (id, user_id, permission, is_active, granted_by_id, granted_at) VALUES (?, ?, ?, 1, ?, ?)",
    )
    .bind(grant.id.to_string())
    .bind(user_id.to_string())
    .bind(&grant.permission)
    .bind(granted_by.to_string())
    .bind(grant.granted_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(grant),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::conflict(format!(
            "{} is already actively granted to this user",
            grant.permission
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Soft-revokes the active grant for `(user_id, permission)`.
pub async fn revoke_permission(pool: &SqlitePool, user_id: Uuid, permission: &str) -> AppResult<PermissionGrant> {
    let sql = format!(
        "SELECT {GRANT_COLUMNS} FROM user_permissions WHERE user_id = ? AND permission = ? AND is_active = 1"
    );
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(permission)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("no active grant for this permission"))?;
    let mut grant = row_parsers::permission_grant_from_row(&row)?;

    let now = Utc::now();
    let affected = sqlx::query("UPDATE user_permissions SET is_active = 0, revoked_at = ? WHERE id = ? AND is_active = 1")
        .bind(now)
        .bind(grant.id.to_string())
        .execute(pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("no active grant for this permission"));
    }

    grant.is_active = false;
    grant.revoked_at = Some(now);
    Ok(grant)
}

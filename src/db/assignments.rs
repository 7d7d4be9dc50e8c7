use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::assignment::EventAssignment;

use super::row_parsers;

const ASSIGNMENT_COLUMNS: &str = "event_id, volunteer_id, assigned_by_id, created_at";

pub async fn list_assignments(pool: &SqlitePool, event_id: &str) -> AppResult<Vec<EventAssignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM event_assignments WHERE event_id = ? ORDER BY created_at");
    let rows = sqlx::query(&sql).bind(event_id).fetch_all(pool).await?;

    rows.iter().map(row_parsers::assignment_from_row).collect()
}

async fn find_assignment(pool: &SqlitePool, event_id: &str, volunteer_id: Uuid) -> AppResult<Option<EventAssignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM event_assignments WHERE event_id = ? AND volunteer_id = ?");
    let row = sqlx::query(&sql)
        .bind(event_id)
        .bind(volunteer_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_parsers::assignment_from_row(&r)).transpose()
}

/// Assigns a volunteer to an event. Re-assigning is a no-op; the flag tells
/// whether a new row was written.
pub async fn assign_volunteer(
    pool: &SqlitePool,
    event_id: &str,
    volunteer_id: Uuid,
    assigned_by: Uuid,
) -> AppResult<(EventAssignment, bool)> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(AppError::validation("event_id", "event_id is required"));
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ?")
        .bind(volunteer_id.to_string())
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("user not found"));
    }

    let result = sqlx::query(
        "INSERT OR IGNORE INTO event_assignments (event_id, volunteer_id, assigned_by_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(event_id)
    .bind(volunteer_id.to_string())
    .bind(assigned_by.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    let assignment = find_assignment(pool, event_id, volunteer_id)
        .await?
        .ok_or_else(|| AppError::internal("assignment missing after insert"))?;

    Ok((assignment, result.rows_affected() == 1))
}

pub async fn unassign_volunteer(pool: &SqlitePool, event_id: &str, volunteer_id: Uuid) -> AppResult<EventAssignment> {
    let assignment = find_assignment(pool, event_id, volunteer_id)
        .await?
        .ok_or_else(|| AppError::not_found("volunteer is not assigned to this event"))?;

    sqlx::query("DELETE FROM event_assignments WHERE event_id = ? AND volunteer_id = ?")
        .bind(event_id)
        .bind(volunteer_id.to_string())
        .execute(pool)
        .await?;

    Ok(assignment)
}

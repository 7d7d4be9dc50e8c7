use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::action_report::{ActionReport, ReportContent, ReportStatus};
use crate::models::assignment::EventAssignment;
use crate::models::permission::PermissionGrant;
use crate::models::user::DbUser;

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (what sqlx writes for DateTime<Utc>)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format, optional fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, AppError> {
    s.as_deref().map(parse_uuid).transpose()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let id_s: String = column(row, "id")?;
    let created_at_s: String = column(row, "created_at")?;
    let updated_at_s: String = column(row, "updated_at")?;

    Ok(DbUser {
        id: parse_uuid(&id_s)?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        role: column(row, "role")?,
        is_active: column(row, "is_active")?,
        created_at: parse_datetime(&created_at_s)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn permission_grant_from_row(row: &SqliteRow) -> Result<PermissionGrant, AppError> {
    let id_s: String = column(row, "id")?;
    let user_id_s: String = column(row, "user_id")?;
    let granted_by_s: Option<String> = column(row, "granted_by_id")?;
    let granted_at_s: String = column(row, "granted_at")?;
    let revoked_at_s: Option<String> = column(row, "revoked_at")?;

    Ok(PermissionGrant {
        id: parse_uuid(&id_s)?,
        user_id: parse_uuid(&user_id_s)?,
        permission: column(row, "permission")?,
        is_active: column(row, "is_active")?,
        granted_by_id: parse_opt_uuid(granted_by_s)?,
        granted_at: parse_datetime(&granted_at_s)?,
        revoked_at: parse_opt_datetime(revoked_at_s)?,
    })
}

pub fn action_report_from_row(row: &SqliteRow) -> Result<ActionReport, AppError> {
    let id_s: String = column(row, "id")?;
    let volunteer_id_s: String = column(row, "volunteer_id")?;
    let status_s: String = column(row, "status")?;
    let reviewed_by_s: Option<String> = column(row, "reviewed_by")?;
    let reviewed_at_s: Option<String> = column(row, "reviewed_at")?;
    let created_at_s: String = column(row, "created_at")?;
    let updated_at_s: String = column(row, "updated_at")?;

    let content = ReportContent {
        has_partner: column(row, "has_partner")?,
        partner_name: column(row, "partner_name")?,
        partner_id_number: column(row, "partner_id_number")?,
        partner_phone: column(row, "partner_phone")?,
        volunteer_role: column(row, "volunteer_role")?,
        full_report: column(row, "full_report")?,
        digital_signature: column(row, "digital_signature")?,
    };

    Ok(ActionReport {
        id: parse_uuid(&id_s)?,
        event_id: column(row, "event_id")?,
        volunteer_id: parse_uuid(&volunteer_id_s)?,
        status: ReportStatus::from_db_label(&status_s)?,
        content,
        review_notes: column(row, "review_notes")?,
        reviewed_by: parse_opt_uuid(reviewed_by_s)?,
        reviewed_at: parse_opt_datetime(reviewed_at_s)?,
        created_at: parse_datetime(&created_at_s)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn assignment_from_row(row: &SqliteRow) -> Result<EventAssignment, AppError> {
    let volunteer_id_s: String = column(row, "volunteer_id")?;
    let assigned_by_s: Option<String> = column(row, "assigned_by_id")?;
    let created_at_s: String = column(row, "created_at")?;

    Ok(EventAssignment {
        event_id: column(row, "event_id")?,
        volunteer_id: parse_uuid(&volunteer_id_s)?,
        assigned_by_id: parse_opt_uuid(assigned_by_s)?,
        created_at: parse_datetime(&created_at_s)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        let a = parse_datetime("2025-03-01T10:15:30+00:00").unwrap();
        let b = parse_datetime("2025-03-01 10:15:30.250").unwrap();
        let c = parse_datetime("2025-03-01").unwrap();

        assert_eq!(a.hour(), 10);
        assert_eq!(b.minute(), 15);
        assert_eq!(c.day(), 1);
        assert_eq!(c.hour(), 0);
    }

    #[test]
    fn rejects_garbage_datetime() {
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn blank_optional_datetime_is_none() {
        assert_eq!(parse_opt_datetime(Some("  ".to_string())).unwrap(), None);
        assert_eq!(parse_opt_datetime(None).unwrap(), None);
    }

    #[test]
    fn optional_uuid_is_parsed() {
        let id = Uuid::new_v4();
        assert_eq!(parse_opt_uuid(Some(id.to_string())).unwrap(), Some(id));
        assert!(parse_opt_uuid(Some("nope".to_string())).is_err());
    }
}

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::action_report::{ActionReport, ReportFilter, ReportStatus};
use crate::models::user::User;

use super::row_parsers;

const REPORT_COLUMNS: &str = "id, event_id, volunteer_id, status, has_partner, partner_name, partner_id_number, \
    partner_phone, volunteer_role, full_report, digital_signature, review_notes, reviewed_by, reviewed_at, \
    created_at, updated_at";

/// Persistence seam for the workflow core.
///
/// Every method is a single-row read or write; lookups return `None` instead of
/// erroring so the caller decides what "missing" means.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Tokens of explicit grants with `is_active = 1`.
    async fn list_active_permissions(&self, user_id: Uuid) -> AppResult<Vec<String>>;

    async fn get_report_by_id(&self, id: Uuid) -> AppResult<Option<ActionReport>>;

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<ActionReport>>;

    /// Fails with `Conflict` if the volunteer already filed a report for the event.
    async fn insert_report(&self, report: &ActionReport) -> AppResult<()>;

    /// Writes every mutable column in one statement, only if the stored status
    /// still equals `expected`. Returns whether the row was updated.
    async fn update_report(&self, report: &ActionReport, expected: ReportStatus) -> AppResult<bool>;

    async fn is_volunteer_assigned(&self, event_id: &str, volunteer_id: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, is_active, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_parsers::db_user_from_row(&r).and_then(User::try_from))
            .transpose()
    }

    async fn list_active_permissions(&self, user_id: Uuid) -> AppResult<Vec<String>> {
        let tokens: Vec<String> = sqlx::query_scalar(
            "SELECT permission FROM user_permissions WHERE user_id = ? AND is_active = 1 ORDER BY permission",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn get_report_by_id(&self, id: Uuid) -> AppResult<Option<ActionReport>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM action_reports WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_parsers::action_report_from_row(&r)).transpose()
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<ActionReport>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM action_reports \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR volunteer_id = ?2) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.db_label()))
            .bind(filter.volunteer_id.map(|id| id.to_string()))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_parsers::action_report_from_row).collect()
    }

    async fn insert_report(&self, report: &ActionReport) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO action_reports ({REPORT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let result = sqlx::query(&sql)
            .bind(report.id.to_string())
            .bind(&report.event_id)
            .bind(report.volunteer_id.to_string())
            .bind(report.status.db_label())
            .bind(report.content.has_partner)
            .bind(&report.content.partner_name)
            .bind(&report.content.partner_id_number)
            .bind(&report.content.partner_phone)
            .bind(&report.content.volunteer_role)
            .bind(&report.content.full_report)
            .bind(report.content.digital_signature)
            .bind(&report.review_notes)
            .bind(report.reviewed_by.map(|id| id.to_string()))
            .bind(report.reviewed_at)
            .bind(report.created_at)
            .bind(report.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AppError::conflict(
                "a report for this event was already filed by this volunteer",
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_report(&self, report: &ActionReport, expected: ReportStatus) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE action_reports SET status = ?, has_partner = ?, partner_name = ?, partner_id_number = ?, \
             partner_phone = ?, volunteer_role = ?, full_report = ?, digital_signature = ?, review_notes = ?, \
             reviewed_by = ?, reviewed_at = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(report.status.db_label())
        .bind(report.content.has_partner)
        .bind(&report.content.partner_name)
        .bind(&report.content.partner_id_number)
        .bind(&report.content.partner_phone)
        .bind(&report.content.volunteer_role)
        .bind(&report.content.full_report)
        .bind(report.content.digital_signature)
        .bind(&report.review_notes)
        .bind(report.reviewed_by.map(|id| id.to_string()))
        .bind(report.reviewed_at)
        .bind(report.updated_at)
        .bind(report.id.to_string())
        .bind(expected.db_label())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_volunteer_assigned(&self, event_id: &str, volunteer_id: Uuid) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM event_assignments WHERE event_id = ? AND volunteer_id = ?",
        )
        .bind(event_id)
        .bind(volunteer_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}

#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use uuid::Uuid;

use elgar_console::authz::RolePermissionTable;
use elgar_console::create_app_with_table;
use elgar_console::db::users;
use elgar_console::models::user::ProvisionUserRequest;

pub const PASSWORD: &str = "password123";

/// Fresh SQLite file with migrations applied, plus the router over it.
/// Keep the `TempDir` alive for the duration of the test.
pub struct TestApp {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub app: Router,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app_with_table(pool.clone(), RolePermissionTable::builtin()).await?;

    Ok(TestApp { dir, pool, app })
}

impl TestApp {
    /// Provisions an account directly in the store and returns its id and email.
    pub async fn user(&self, role: &str) -> Result<(Uuid, String)> {
        let email = format!("{}@example.org", Uuid::new_v4().simple());
        let user = users::provision_user(
            &self.pool,
            &ProvisionUserRequest {
                name: format!("{role} user"),
                email: email.clone(),
                password: PASSWORD.to_string(),
                role: role.to_string(),
            },
        )
        .await?;
        Ok((user.id, email))
    }

    pub async fn login(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .send("POST", "/auth/login", None, Some(json!({ "email": email, "password": PASSWORD })))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        Ok(body["token"].as_str().context("missing token")?.to_string())
    }

    /// Provisions and logs in; returns id and bearer token.
    pub async fn session(&self, role: &str) -> Result<(Uuid, String)> {
        let (id, email) = self.user(role).await?;
        let token = self.login(&email).await?;
        Ok((id, token))
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        match body {
            Some(body) => {
                self.send_raw(method, uri, token, Some("application/json"), body.to_string())
                    .await
            }
            None => self.send_raw(method, uri, token, None, String::new()).await,
        }
    }

    /// Like `send`, but the caller controls the content type and the raw bytes.
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: String,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let req = builder.body(Body::from(body))?;

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, value))
    }

    pub async fn assign(&self, event_id: &str, volunteer_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO event_assignments (event_id, volunteer_id, created_at) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(volunteer_id.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub fn report_body(event_id: &str) -> Value {
    json!({
        "event_id": event_id,
        "has_partner": false,
        "volunteer_role": "driver",
        "full_report": "Arrived 21:04, patient stable, handed over to ambulance crew.",
        "digital_signature": true
    })
}

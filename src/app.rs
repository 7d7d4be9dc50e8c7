use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DefaultPolicyEvaluator, RolePermissionTable};
use crate::db::{ReportStore, SqliteReportStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{action_reports, assignments, auth, authz, health, users};
use crate::workflow::ReportWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub evaluator: Arc<DefaultPolicyEvaluator>,
    pub store: Arc<dyn ReportStore>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, table: RolePermissionTable, event_bus: EventBus) -> Self {
        Self {
            store: Arc::new(SqliteReportStore::new(pool.clone())),
            pool,
            jwt: Arc::new(jwt),
            evaluator: Arc::new(DefaultPolicyEvaluator::new(Arc::new(table))),
            event_bus,
        }
    }

    pub fn workflow(&self) -> ReportWorkflow<'_> {
        ReportWorkflow::new(self.store.as_ref(), self.evaluator.as_ref())
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let table = RolePermissionTable::from_env()?;
    create_app_with_table(pool, table).await
}

/// Builds the router and spawns the activity listener. Must run inside a Tokio runtime.
pub async fn create_app_with_table(pool: SqlitePool, table: RolePermissionTable) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, table, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", post(users::provision_user))
        .route("/:id", get(users::get_user))
        .route("/:id/role", put(users::update_role))
        .route("/:id/deactivate", post(users::deactivate_user))
        .route("/:id/activate", post(users::activate_user))
        .route("/:id/permissions", get(users::list_permissions).post(users::grant_permission))
        .route("/:id/permissions/:permission", axum::routing::delete(users::revoke_permission))
        .route("/:id/effective-permissions", get(users::effective_permissions));

    let authz_routes = Router::new()
        .route("/check", post(authz::check))
        .route("/route", post(authz::route_decision))
        .route("/roles", get(authz::list_roles));

    let assignment_routes = Router::new()
        .route("/", get(assignments::list_assignments))
        .route("/:user_id", put(assignments::assign_volunteer).delete(assignments::unassign_volunteer));

    let report_routes = Router::new()
        .route("/", get(action_reports::list_reports).post(action_reports::create_report))
        .route("/:id", get(action_reports::get_report).put(action_reports::resubmit_report))
        .route("/:id/review", post(action_reports::open_for_review))
        .route("/:id/approve", post(action_reports::approve_report))
        .route("/:id/reject", post(action_reports::reject_report));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/authz", authz_routes)
        .nest("/events/:event_id/volunteers", assignment_routes)
        .nest("/action-reports", report_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

pub const DEFAULT_PORT: u16 = 8000;

/// Listening port from `APP_PORT`; unset means the default, anything unparsable is an error.
pub fn port_from_env() -> Result<u16, AppError> {
    parse_port(std::env::var("APP_PORT").ok().as_deref())
}

fn parse_port(raw: Option<&str>) -> Result<u16, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PORT),
        Some(value) => value
            .parse::<u16>()
            .map_err(|_| AppError::configuration(format!("APP_PORT must be a port number, got {value:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_when_unset() {
        assert_eq!(parse_port(None).unwrap(), DEFAULT_PORT);
        assert_eq!(parse_port(Some("  ")).unwrap(), DEFAULT_PORT);
        assert_eq!(parse_port(Some("9090")).unwrap(), 9090);
    }

    #[test]
    fn unparsable_port_is_a_configuration_error() {
        for raw in ["eighty", "70000", "-1"] {
            let err = parse_port(Some(raw)).unwrap_err();
            assert_eq!(err.kind(), "configuration", "{raw}");
        }
    }
}

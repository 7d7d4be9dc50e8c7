use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{Denial, RouteDecision};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::users::provision_user,
		routes::users::get_user,
		routes::users::update_role,
		routes::users::deactivate_user,
		routes::users::activate_user,
		routes::users::list_permissions,
		routes::users::grant_permission,
		routes::users::revoke_permission,
		routes::users::effective_permissions,
		routes::authz::check,
		routes::authz::route_decision,
		routes::authz::list_roles,
		routes::assignments::list_assignments,
		routes::assignments::assign_volunteer,
		routes::assignments::unassign_volunteer,
		routes::action_reports::list_reports,
		routes::action_reports::create_report,
		routes::action_reports::get_report,
		routes::action_reports::open_for_review,
		routes::action_reports::approve_report,
		routes::action_reports::reject_report,
		routes::action_reports::resubmit_report
	),
	components(
		schemas(
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::MeResponse,
			models::user::ProvisionUserRequest,
			models::user::UpdateRoleRequest,
			models::permission::PermissionGrant,
			models::permission::GrantPermissionRequest,
			models::permission::EffectivePermissions,
			models::assignment::EventAssignment,
			models::action_report::ActionReport,
			models::action_report::ReportStatus,
			models::action_report::ReportContent,
			models::action_report::CreateReportRequest,
			models::action_report::ReviewRequest,
			routes::health::HealthResponse,
			routes::auth::MessageResponse,
			routes::authz::CheckRequest,
			routes::authz::CheckResponse,
			routes::authz::RouteRequest,
			RouteDecision,
			Denial
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness and store reachability"),
		(name = "Auth", description = "Login and session identity"),
		(name = "Users", description = "Account provisioning and permission grants"),
		(name = "Authz", description = "Permission checks and route guard decisions"),
		(name = "Assignments", description = "Volunteer to event assignments"),
		(name = "Action Reports", description = "Action report submission and review")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			let mut scheme = Http::new(HttpAuthScheme::Bearer);
			scheme.bearer_format = Some("JWT".to_string());
			components.add_security_scheme("bearerAuth", SecurityScheme::Http(scheme));
		}
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	ensure_servers(&mut doc, port);
	Ok(serde_json::from_value(doc)?)
}

/// Swagger UI at `/docs`, reading the document from `/api-docs/openapi.json`.
pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

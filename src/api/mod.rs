// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::{
        require_admin, require_api_key, require_auth, require_realm, require_realm_admin,
    },
    error::ErrorBody,
    models::{IssueCodeRequest, IssueCodeResponse, RealmSummary, TestType, UserMeResponse},
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod issue;
pub mod realm;
pub mod signout;
pub mod users;

pub fn router(state: AppState) -> Router {
    // Guards run bottom-up: the last route_layer added runs first.
    let realm_routes = Router::new()
        .route("/issue", post(issue::issue_code))
        .merge(
            Router::new()
                .route("/realm", get(realm::get_realm))
                .route_layer(from_fn(require_realm_admin)),
        )
        .route_layer(from_fn_with_state(state.clone(), require_realm));

    let admin_routes = Router::new()
        .route("/admin/realms", get(admin::list_realms))
        .route_layer(from_fn(require_admin));

    let session_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .merge(realm_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let app_routes = Router::new()
        .route("/api/issue", post(issue::issue_code_for_app))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .nest("/v1", session_routes.merge(app_routes))
        .route("/signout", get(signout::signout))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::new);
        components.add_security_scheme(
            "session",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session"))),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        issue::issue_code,
        issue::issue_code_for_app,
        users::get_current_user,
        realm::get_realm,
        admin::list_realms,
        signout::signout,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            IssueCodeRequest,
            IssueCodeResponse,
            TestType,
            RealmSummary,
            UserMeResponse,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Issuance", description = "Verification code issuance"),
        (name = "Users", description = "Signed-in user"),
        (name = "Realms", description = "Realm administration"),
        (name = "Admin", description = "System administration"),
        (name = "Session", description = "Session management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

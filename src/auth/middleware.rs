// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization guards for Axum.
//!
//! Each guard is applied with `axum::middleware::from_fn_with_state` and owns
//! exactly one check. Route tables compose them in order:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/realm", get(realm::get_realm))
//!     .route_layer(from_fn(require_realm_admin))
//!     .route_layer(from_fn_with_state(state.clone(), require_realm))
//!     .route_layer(from_fn_with_state(state.clone(), require_auth));
//! ```
//!
//! (The last layer added runs first.)
//!
//! ## Failure Responses
//!
//! API requests (JSON content type or accept header) get the `{"error"}`
//! envelope. Browser requests are redirected with a `flash` cookie carrying
//! the user-visible message.

use axum::{
    extract::{Request, State},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use super::api_key::resolve_app;
use super::error::AuthError;
use super::principal::{Principal, RequestContext};
use crate::state::AppState;

/// Cookie holding the selected realm id.
pub const REALM_COOKIE: &str = "realm";

/// Cookie holding a one-shot message for the next rendered page.
pub const FLASH_COOKIE: &str = "flash";

const FLASH_MAX_AGE: time::Duration = time::Duration::seconds(60);

/// Whether the caller speaks JSON rather than being a browser.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let is_json = |name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
    };
    is_json(CONTENT_TYPE) || is_json(ACCEPT)
}

/// Log the cause, then answer with the coarse user-facing form.
fn reject(err: AuthError, json: bool) -> Response {
    match &err {
        AuthError::Store(_) | AuthError::MissingContext(_) => {
            tracing::error!(kind = err.error_code(), error = %err, "Authorization failed");
        }
        _ => tracing::warn!(kind = err.error_code(), error = %err, "Authorization failed"),
    }

    if json {
        return err.into_response();
    }

    let flash: String =
        url::form_urlencoded::byte_serialize(err.user_message().as_bytes()).collect();
    let cookie = Cookie::build((FLASH_COOKIE, flash))
        .path("/")
        .max_age(FLASH_MAX_AGE)
        .http_only(true)
        .same_site(SameSite::Lax);
    (CookieJar::new().add(cookie), Redirect::to(err.redirect_path())).into_response()
}

fn context(request: &Request) -> Result<&RequestContext, AuthError> {
    request
        .extensions()
        .get::<RequestContext>()
        .ok_or(AuthError::MissingContext("principal"))
}

/// Establish the signed-in user from the session cookie.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let json = wants_json(request.headers());
    match state.sessions.resolve(request.headers()).await {
        Ok(user) => {
            request
                .extensions_mut()
                .insert(RequestContext::new(Principal::User(user)));
            next.run(request).await
        }
        Err(err) => reject(err, json),
    }
}

/// Bind the realm chosen in the `realm` cookie. Runs after [`require_auth`].
pub async fn require_realm(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let json = wants_json(request.headers());
    let ctx = request.extensions().get::<RequestContext>().cloned();
    match select_realm(&state, request.headers(), ctx).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => reject(err, json),
    }
}

async fn select_realm(
    state: &AppState,
    headers: &HeaderMap,
    ctx: Option<RequestContext>,
) -> Result<RequestContext, AuthError> {
    let ctx = ctx.ok_or(AuthError::MissingContext("principal"))?;
    let realm_id = CookieJar::from_headers(headers)
        .get(REALM_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
        .ok_or(AuthError::NoRealmSelected)?;

    let realm = state
        .store
        .find_realm(realm_id)
        .await?
        .ok_or(AuthError::NoRealmSelected)?;
    if !ctx.principal.can_issue_in(realm.id) {
        return Err(AuthError::NoRealmSelected);
    }
    Ok(ctx.with_realm(realm))
}

/// Require that the principal administers the selected realm.
///
/// Runs after [`require_auth`] and [`require_realm`]; a missing principal
/// or realm fails closed.
pub async fn require_realm_admin(request: Request, next: Next) -> Response {
    let json = wants_json(request.headers());
    let check = context(&request).and_then(|ctx| {
        let realm = ctx.realm.as_ref().ok_or(AuthError::MissingContext("realm"))?;
        if ctx.principal.can_admin_realm(realm.id) {
            Ok(())
        } else {
            Err(AuthError::NotRealmAdmin(realm.id))
        }
    });
    match check {
        Ok(()) => next.run(request).await,
        Err(err) => reject(err, json),
    }
}

/// Require a system administrator. Runs after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Response {
    let json = wants_json(request.headers());
    let check = context(&request).and_then(|ctx| {
        if ctx.principal.is_system_admin() {
            Ok(())
        } else {
            Err(AuthError::NotSystemAdmin)
        }
    });
    match check {
        Ok(()) => next.run(request).await,
        Err(err) => reject(err, json),
    }
}

/// Authenticate a machine caller by `X-API-Key`. Always answers in JSON.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_app(state.store.as_ref(), &state.api_keys, request.headers()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => reject(err, true),
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the request context built by the guards.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(ctx): Auth) -> impl IntoResponse {
//!     // ctx.principal, ctx.realm
//! }
//! ```
//!
//! The extractor never authenticates on its own. A handler mounted without
//! the guards is rejected rather than served anonymously.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, RequestContext};

pub struct Auth(pub RequestContext);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| {
                tracing::error!("Handler reached without an authorization guard");
                AuthError::MissingContext("principal")
            })
    }
}

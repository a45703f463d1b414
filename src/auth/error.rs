// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! The variant is always logged; the caller only sees [`AuthError::user_message`],
//! which is deliberately coarse for authentication failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::storage::StoreError;

/// Message shown for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Message shown when a user tries to administer a realm they do not own.
pub const NOT_REALM_ADMIN_MESSAGE: &str = "You are not authorized to admin that realm.";

pub const NO_REALM_MESSAGE: &str = "no realm selected";

/// Where a browser is sent after a failed check.
pub const SIGNOUT_PATH: &str = "/signout";
pub const REALM_SELECT_PATH: &str = "/realm";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("session credential is missing or malformed")]
    MissingCredential,

    #[error("session credential is invalid: {0}")]
    InvalidCredential(String),

    #[error("session claims do not carry a string email")]
    MalformedClaims,

    #[error("no user with email {0}")]
    UserNotFound(String),

    #[error("user {0} is disabled")]
    UserDisabled(String),

    #[error("revocation check failed: {0}")]
    RevocationCheckFailed(String),

    #[error("api key is unknown")]
    UnknownApiKey,

    #[error("authorized app {0} is disabled")]
    AppDisabled(String),

    #[error("no realm selected")]
    NoRealmSelected,

    #[error("principal cannot administer realm {0}")]
    NotRealmAdmin(uuid::Uuid),

    #[error("principal is not a system administrator")]
    NotSystemAdmin,

    /// A guard ran without the context an earlier guard should have set.
    #[error("request context is missing {0}")]
    MissingContext(&'static str),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable identifier used as the `kind` field in logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidCredential(_) => "invalid_credential",
            AuthError::MalformedClaims => "malformed_claims",
            AuthError::UserNotFound(_) => "user_not_found",
            AuthError::UserDisabled(_) => "user_disabled",
            AuthError::RevocationCheckFailed(_) => "revocation_check_failed",
            AuthError::UnknownApiKey => "unknown_api_key",
            AuthError::AppDisabled(_) => "app_disabled",
            AuthError::NoRealmSelected => "no_realm_selected",
            AuthError::NotRealmAdmin(_) => "not_realm_admin",
            AuthError::NotSystemAdmin => "not_system_admin",
            AuthError::MissingContext(_) => "missing_context",
            AuthError::Store(_) => "store_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NoRealmSelected => StatusCode::UNPROCESSABLE_ENTITY,
            // Store failures while resolving a principal still deny access.
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Text safe to show the caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::NotRealmAdmin(_) => NOT_REALM_ADMIN_MESSAGE,
            AuthError::NoRealmSelected => NO_REALM_MESSAGE,
            _ => UNAUTHORIZED_MESSAGE,
        }
    }

    /// Redirect target for browser requests.
    pub fn redirect_path(&self) -> &'static str {
        match self {
            AuthError::NotRealmAdmin(_) | AuthError::NoRealmSelected => REALM_SELECT_PATH,
            _ => SIGNOUT_PATH,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.user_message())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

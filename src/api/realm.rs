// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Realm administration endpoints.

use axum::Json;

use crate::auth::{Auth, AuthError};
use crate::error::{ApiError, ErrorBody};
use crate::models::RealmSummary;

/// Summary of the selected realm. Realm administrators only.
#[utoipa::path(
    get,
    path = "/v1/realm",
    tag = "Realms",
    security(("session" = [])),
    responses(
        (status = 200, description = "Selected realm", body = RealmSummary),
        (status = 401, description = "Not an administrator of this realm", body = ErrorBody),
        (status = 422, description = "No realm selected", body = ErrorBody),
    )
)]
pub async fn get_realm(Auth(ctx): Auth) -> Result<Json<RealmSummary>, ApiError> {
    let realm = ctx.realm.as_ref().ok_or(AuthError::MissingContext("realm"))?;
    Ok(Json(realm.into()))
}

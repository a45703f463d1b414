// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;

use crate::auth::{Auth, AuthError};
use crate::error::{ApiError, ErrorBody};
use crate::models::UserMeResponse;

/// Get the signed-in user's identity and privileges.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    )
)]
pub async fn get_current_user(Auth(ctx): Auth) -> Result<Json<UserMeResponse>, ApiError> {
    let user = ctx
        .principal
        .user()
        .ok_or(AuthError::MissingContext("user"))?;
    Ok(Json(user.into()))
}

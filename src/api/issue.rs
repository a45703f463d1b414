// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification code issuance endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    auth::{Auth, RequestContext},
    error::{ApiError, ErrorBody},
    models::{IssueCodeRequest, IssueCodeResponse},
    state::AppState,
};

async fn issue(
    state: &AppState,
    ctx: &RequestContext,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> Result<Json<IssueCodeResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Malformed issuance request");
        ApiError::bad_request(format!("invalid request: {}", rejection.body_text()))
    })?;
    let issued = state.issuance.issue(ctx, &request).await?;
    Ok(Json(issued.into()))
}

/// Issue a verification code in the selected realm.
///
/// Requires a session cookie and a selected realm. When `phone` is set the
/// code is also sent by SMS, and an undelivered code is withdrawn.
#[utoipa::path(
    post,
    path = "/v1/issue",
    tag = "Issuance",
    security(("session" = [])),
    request_body = IssueCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = IssueCodeResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 500, description = "Generation or delivery failed, retry", body = ErrorBody)
    )
)]
pub async fn issue_code(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> Result<Json<IssueCodeResponse>, ApiError> {
    issue(&state, &ctx, payload).await
}

/// Issue a verification code as an authorized app.
///
/// The code is issued in the realm the API key is bound to.
#[utoipa::path(
    post,
    path = "/v1/api/issue",
    tag = "Issuance",
    security(("api_key" = [])),
    request_body = IssueCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = IssueCodeResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 401, description = "Unknown or disabled API key", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 500, description = "Generation or delivery failed, retry", body = ErrorBody)
    )
)]
pub async fn issue_code_for_app(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> Result<Json<IssueCodeResponse>, ApiError> {
    issue(&state, &ctx, payload).await
}

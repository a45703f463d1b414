// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! System administration endpoints.
//!
//! Mounted behind `require_auth` and `require_admin`.

use axum::{extract::State, Json};

use crate::{
    error::{ApiError, ErrorBody},
    models::RealmSummary,
    state::AppState,
};

/// List every realm.
#[utoipa::path(
    get,
    path = "/v1/admin/realms",
    tag = "Admin",
    security(("session" = [])),
    responses(
        (status = 200, description = "All realms, sorted by name", body = Vec<RealmSummary>),
        (status = 401, description = "Not a system administrator", body = ErrorBody),
        (status = 500, description = "Store unavailable", body = ErrorBody),
    )
)]
pub async fn list_realms(State(state): State<AppState>) -> Result<Json<Vec<RealmSummary>>, ApiError> {
    let realms = state.store.list_realms().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list realms");
        ApiError::internal("Failed to list realms")
    })?;
    Ok(Json(realms.iter().map(RealmSummary::from).collect()))
}

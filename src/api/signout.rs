// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::response::Redirect;
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::auth::middleware::REALM_COOKIE;
use crate::auth::SESSION_COOKIE;

/// Clear the session and realm selection, then return to the start page.
#[utoipa::path(
    get,
    path = "/signout",
    tag = "Session",
    responses((status = 303, description = "Cookies cleared, redirect to /"))
)]
pub async fn signout(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar
        .remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(REALM_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}

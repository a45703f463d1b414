// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticated actor and the request-scoped context the guards build.

use uuid::Uuid;

use crate::storage::{AuthorizedApp, CodeIssuer, Realm, User};

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A human operator signed in with a session cookie.
    User(User),
    /// A machine caller authenticated by API key. Bound to one realm.
    App(AuthorizedApp),
}

impl Principal {
    pub fn can_admin_realm(&self, realm_id: Uuid) -> bool {
        match self {
            Principal::User(user) => user.can_admin_realm(realm_id),
            Principal::App(_) => false,
        }
    }

    /// Whether codes may be issued in the given realm.
    pub fn can_issue_in(&self, realm_id: Uuid) -> bool {
        match self {
            Principal::User(user) => user.can_view_realm(realm_id),
            Principal::App(app) => app.realm_id == realm_id,
        }
    }

    pub fn is_system_admin(&self) -> bool {
        matches!(self, Principal::User(user) if user.admin)
    }

    /// Pick the realm this principal acts in.
    ///
    /// An app always acts in its own realm; a user acts in whichever realm
    /// was selected for the request.
    pub fn resolve_realm<'a>(&self, selected: Option<&'a Realm>) -> Option<&'a Realm> {
        match self {
            Principal::User(_) => selected,
            Principal::App(app) => selected.filter(|realm| realm.id == app.realm_id),
        }
    }

    pub fn issuer(&self) -> CodeIssuer {
        match self {
            Principal::User(user) => CodeIssuer::User(user.id),
            Principal::App(app) => CodeIssuer::App(app.id),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::App(_) => None,
        }
    }
}

/// Set once by the authentication guard, then read by later guards and
/// handlers. Later guards only ever add the realm.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
    pub realm: Option<Realm>,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            realm: None,
        }
    }

    pub fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = Some(realm);
        self
    }
}

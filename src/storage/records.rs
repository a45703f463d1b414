// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Records persisted by the credential store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::models::TestType;

/// Canonical form of an email address used as the user lookup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// A human operator who signs in with a session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// System-wide administrator, independent of any realm.
    pub admin: bool,
    pub disabled: bool,
    /// Realms the user may issue codes in.
    #[serde(default)]
    pub realms: Vec<Uuid>,
    /// Realms the user administers. Implies membership.
    #[serde(default)]
    pub admin_realms: Vec<Uuid>,
    /// Last time the session was re-validated against the revocation
    /// authority. Only ever moves forward.
    pub last_revoke_check: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.into(),
            admin: false,
            disabled: false,
            realms: Vec::new(),
            admin_realms: Vec::new(),
            last_revoke_check: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn can_admin_realm(&self, realm_id: Uuid) -> bool {
        self.admin_realms.contains(&realm_id)
    }

    pub fn can_view_realm(&self, realm_id: Uuid) -> bool {
        self.realms.contains(&realm_id) || self.can_admin_realm(realm_id)
    }
}

/// Outbound SMS gateway settings for a realm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsSettings {
    pub gateway_url: String,
    pub from_number: String,
}

/// A tenant boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Realm {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsSettings>,
}

impl Realm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sms: None,
        }
    }
}

/// A machine credential bound to exactly one realm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizedApp {
    pub id: Uuid,
    pub name: String,
    pub realm_id: Uuid,
    /// HMAC digest of the API key; the raw key is never stored.
    pub api_key_digest: String,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Who issued a verification code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CodeIssuer {
    User(Uuid),
    App(Uuid),
}

/// An issued, not yet consumed verification code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub test_type: TestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom_date: Option<NaiveDate>,
    pub issued_by: CodeIssuer,
    pub realm_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures of the REST API. All types derive
//! `Serialize` and/or `Deserialize` plus `ToSchema` for automatic JSON
//! handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Issuance**: verification code requests and responses
//! - **Views**: current user and realm summaries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::{Realm, User};

// =============================================================================
// Test Type
// =============================================================================

/// Diagnosis classification attached to a verification code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Confirmed,
    Likely,
    Negative,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Confirmed => "confirmed",
            TestType::Likely => "likely",
            TestType::Negative => "negative",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a test type is not one of the accepted values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTestType(pub String);

impl FromStr for TestType {
    type Err = UnknownTestType;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(TestType::Confirmed),
            "likely" => Ok(TestType::Likely),
            "negative" => Ok(TestType::Negative),
            _ => Err(UnknownTestType(s.to_string())),
        }
    }
}

// =============================================================================
// Issuance Models
// =============================================================================

/// Request body for code issuance.
///
/// `testType` is kept as free text so an unknown value is reported with the
/// issuance error message rather than a generic JSON rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueCodeRequest {
    /// One of `confirmed`, `likely`, `negative` (case-insensitive).
    #[schema(example = "confirmed")]
    pub test_type: String,
    /// Symptom onset date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2026-10-12")]
    pub symptom_date: Option<String>,
    /// Patient phone number. When present the code is also sent by SMS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Successful issuance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueCodeResponse {
    #[schema(example = "04812977")]
    pub code: String,
    /// Expiry in RFC 1123 form.
    #[schema(example = "Sat, 17 Oct 2026 14:00:00 UTC")]
    pub expires_at: String,
    /// Expiry in seconds since the Unix epoch.
    pub expires_at_timestamp: i64,
}

// =============================================================================
// View Models
// =============================================================================

/// Realm summary shown to realm and system administrators.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RealmSummary {
    pub id: Uuid,
    pub name: String,
    /// Whether codes issued in this realm can be sent by SMS.
    pub sms_configured: bool,
}

impl From<&Realm> for RealmSummary {
    fn from(realm: &Realm) -> Self {
        Self {
            id: realm.id,
            name: realm.name.clone(),
            sms_configured: realm.sms.is_some(),
        }
    }
}

/// Response for GET /v1/users/me
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// System-wide administrator.
    pub admin: bool,
    pub realms: Vec<Uuid>,
    pub admin_realms: Vec<Uuid>,
}

impl From<&User> for UserMeResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            admin: user.admin,
            realms: user.realms.clone(),
            admin_realms: user.admin_realms.clone(),
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider seam used by the session resolver.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Signature, expiry, issuer or audience check failed.
    #[error("invalid session token: {0}")]
    Invalid(String),

    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),

    #[error("session has been revoked")]
    Revoked,

    #[error("revocation authority unavailable: {0}")]
    RevocationUnavailable(String),
}

/// Raw claims of a verified session token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SessionClaims(pub Map<String, Value>);

impl SessionClaims {
    /// The `email` claim, only when it is a string.
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check signature and validity of a session token.
    async fn verify(&self, token: &str) -> Result<SessionClaims, IdentityError>;

    /// As [`IdentityVerifier::verify`], then ask the authority whether the
    /// session has been revoked since it was minted.
    async fn verify_and_check_revocation(&self, token: &str)
        -> Result<SessionClaims, IdentityError>;

    /// `Some(true)` when signing keys are available, `None` when the
    /// verifier has no remote dependency.
    async fn key_status(&self) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_must_be_a_string() {
        let claims: SessionClaims =
            serde_json::from_value(json!({"email": "a@example.com"})).unwrap();
        assert_eq!(claims.email(), Some("a@example.com"));

        let numeric: SessionClaims = serde_json::from_value(json!({"email": 42})).unwrap();
        assert_eq!(numeric.email(), None);

        assert_eq!(SessionClaims::default().email(), None);
    }
}

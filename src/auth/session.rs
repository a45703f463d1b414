// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie verification.
//!
//! ## Verification Modes
//!
//! - **Production** (`SESSION_JWKS_URL` set): signature checked against the
//!   identity provider's JWKS
//! - **Development** (`SESSION_HMAC_SECRET` only): HS256 with a shared secret
//!
//! Revocation is asked of `REVOCATION_URL` when configured. Without it the
//! revocation check degrades to a fresh signature and expiry check.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::identity::{IdentityError, IdentityVerifier, SessionClaims};
use super::jwks::JwksManager;
use crate::config::SessionConfig;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

enum SessionKeys {
    Jwks(JwksManager),
    Secret(DecodingKey),
}

pub struct SessionVerifier {
    keys: SessionKeys,
    issuer: Option<String>,
    audience: Option<String>,
    revocation: Option<RevocationClient>,
}

impl SessionVerifier {
    pub fn with_jwks(jwks: JwksManager) -> Self {
        Self {
            keys: SessionKeys::Jwks(jwks),
            issuer: None,
            audience: None,
            revocation: None,
        }
    }

    /// Development verifier. MUST NOT be used in production.
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            keys: SessionKeys::Secret(DecodingKey::from_secret(secret)),
            issuer: None,
            audience: None,
            revocation: None,
        }
    }

    /// Build from configuration; JWKS wins over a shared secret.
    pub fn from_config(config: &SessionConfig) -> Option<Self> {
        let verifier = match (&config.jwks_url, &config.hmac_secret) {
            (Some(url), _) => Self::with_jwks(JwksManager::new(url.clone())),
            (None, Some(secret)) => {
                tracing::warn!("Session cookies verified with a shared HMAC secret (development mode)");
                Self::with_secret(secret.as_bytes())
            }
            (None, None) => return None,
        };
        let verifier = match &config.issuer {
            Some(issuer) => verifier.with_issuer(issuer.as_str()),
            None => verifier,
        };
        let verifier = match &config.audience {
            Some(audience) => verifier.with_audience(audience.as_str()),
            None => verifier,
        };
        Some(match &config.revocation_url {
            Some(url) => verifier.with_revocation_url(url.as_str()),
            None => verifier,
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_revocation_url(mut self, url: impl Into<String>) -> Self {
        self.revocation = Some(RevocationClient::new(url.into()));
        self
    }

    async fn decoding_key(&self, token: &str) -> Result<(DecodingKey, Algorithm), IdentityError> {
        match &self.keys {
            SessionKeys::Secret(key) => Ok((key.clone(), Algorithm::HS256)),
            SessionKeys::Jwks(jwks) => {
                let header =
                    decode_header(token).map_err(|e| IdentityError::Invalid(e.to_string()))?;
                match header.kid {
                    Some(kid) => jwks.get_decoding_key(&kid).await,
                    None => jwks.get_any_decoding_key().await,
                }
            }
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl IdentityVerifier for SessionVerifier {
    async fn verify(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        let (key, algorithm) = self.decoding_key(token).await?;
        let data = decode::<SessionClaims>(token, &key, &self.validation(algorithm))
            .map_err(|e| IdentityError::Invalid(e.to_string()))?;
        Ok(data.claims)
    }

    async fn verify_and_check_revocation(
        &self,
        token: &str,
    ) -> Result<SessionClaims, IdentityError> {
        let claims = self.verify(token).await?;
        if let Some(revocation) = &self.revocation {
            revocation.check(token).await?;
        }
        Ok(claims)
    }

    async fn key_status(&self) -> Option<bool> {
        match &self.keys {
            SessionKeys::Secret(_) => None,
            SessionKeys::Jwks(jwks) => {
                Some(jwks.is_cached().await || jwks.refresh().await.is_ok())
            }
        }
    }
}

#[derive(Serialize)]
struct RevocationRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct RevocationResponse {
    revoked: bool,
}

/// Client for the revocation authority.
///
/// POSTs `{"token": ...}` and expects `{"revoked": bool}`.
pub struct RevocationClient {
    url: String,
    client: reqwest::Client,
}

impl RevocationClient {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { url, client }
    }

    pub async fn check(&self, token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RevocationRequest { token })
            .send()
            .await
            .map_err(|e| IdentityError::RevocationUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::RevocationUnavailable(format!(
                "HTTP {} from revocation authority",
                response.status()
            )));
        }

        let body: RevocationResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::RevocationUnavailable(e.to_string()))?;
        if body.revoked {
            return Err(IdentityError::Revoked);
        }
        Ok(())
    }
}

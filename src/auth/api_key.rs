// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key authentication for machine callers.
//!
//! Keys are never stored. The store holds `base64(HMAC-SHA256(secret, key))`
//! and lookups digest the presented key the same way.

use axum::http::HeaderMap;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::AuthError;
use super::principal::{Principal, RequestContext};
use crate::storage::CredentialStore;

pub const API_KEY_HEADER: &str = "x-api-key";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct ApiKeyDigester {
    mac: HmacSha256,
}

impl ApiKeyDigester {
    pub fn new(secret: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    pub fn digest(&self, api_key: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(api_key.as_bytes());
        Base64::encode_string(&mac.finalize().into_bytes())
    }
}

/// Resolve an `X-API-Key` header to an app principal and its realm.
pub async fn resolve_app(
    store: &dyn CredentialStore,
    digester: &ApiKeyDigester,
    headers: &HeaderMap,
) -> Result<RequestContext, AuthError> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(AuthError::MissingCredential)?;

    let app = store
        .find_app_by_key_digest(&digester.digest(key))
        .await?
        .ok_or(AuthError::UnknownApiKey)?;
    if app.disabled {
        return Err(AuthError::AppDisabled(app.name));
    }

    let realm = store.find_realm(app.realm_id).await?.ok_or_else(|| {
        AuthError::InvalidCredential(format!("realm {} of app {} is gone", app.realm_id, app.id))
    })?;

    Ok(RequestContext::new(Principal::App(app)).with_realm(realm))
}

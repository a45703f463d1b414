// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request session resolution.
//!
//! ## Steps
//!
//! 1. Read the `session` cookie
//! 2. Verify it with the identity provider
//! 3. Extract the `email` claim
//! 4. Load the user; reject unknown or disabled users
//! 5. When the revocation TTL has elapsed, re-check the session with the
//!    authority and advance the stored `last_revoke_check`, re-reading the
//!    user so a disable that raced the check still wins
//! 6. Hand the user back for binding into the request context
//!
//! A failed revocation check or a failed persist of its timestamp rejects
//! the request even though the cookie itself verified.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use super::error::AuthError;
use super::identity::IdentityVerifier;
use crate::clock::Clock;
use crate::storage::{CredentialStore, User};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

pub struct SessionResolver {
    store: Arc<dyn CredentialStore>,
    identity: Arc<dyn IdentityVerifier>,
    clock: Arc<dyn Clock>,
    revoke_check_ttl: chrono::Duration,
}

impl SessionResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityVerifier>,
        clock: Arc<dyn Clock>,
        revoke_check_ttl: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            revoke_check_ttl: chrono::Duration::from_std(revoke_check_ttl)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Resolve the signed-in user from request headers.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let jar = CookieJar::from_headers(headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        self.resolve_token(&token).await
    }

    pub async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .identity
            .verify(token)
            .await
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        let email = claims.email().ok_or(AuthError::MalformedClaims)?;

        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))?;
        if user.disabled {
            return Err(AuthError::UserDisabled(user.email));
        }

        let now = self.clock.now();
        let check_due = user
            .last_revoke_check
            .checked_add_signed(self.revoke_check_ttl)
            .is_some_and(|due| now > due);
        if check_due {
            self.identity
                .verify_and_check_revocation(token)
                .await
                .map_err(|e| AuthError::RevocationCheckFailed(e.to_string()))?;

            // Only the timestamp is written; the returned record reflects
            // any change made while the check was in flight.
            let current = self
                .store
                .advance_revoke_check(&user.email, now)
                .await
                .map_err(|e| {
                    AuthError::RevocationCheckFailed(format!("failed to persist check time: {e}"))
                })?;
            if current.disabled {
                return Err(AuthError::UserDisabled(current.email));
            }
            tracing::debug!(user_id = %current.id, "Session revocation check passed");
            return Ok(current);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{IdentityError, SessionClaims};
    use crate::clock::FixedClock;
    use crate::storage::InMemoryStore;
    use crate::test_support::{CountingVerifier, ScriptedStore};
    use async_trait::async_trait;
    use axum::http::header::COOKIE;
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    const TTL: Duration = Duration::from_secs(300);

    struct Fixture {
        store: Arc<InMemoryStore>,
        verifier: Arc<CountingVerifier>,
        clock: Arc<FixedClock>,
        resolver: SessionResolver,
    }

    fn fixture(verifier: CountingVerifier) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let verifier = Arc::new(verifier);
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let resolver = SessionResolver::new(store.clone(), verifier.clone(), clock.clone(), TTL);
        Fixture {
            store,
            verifier,
            clock,
            resolver,
        }
    }

    async fn seed(store: &InMemoryStore, email: &str, disabled: bool) -> User {
        let mut user = User::new(email, "Tracer");
        user.disabled = disabled;
        store.save_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn missing_cookie_is_missing_credential() {
        let f = fixture(CountingVerifier::default());
        let err = f.resolver.resolve(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "session=".parse().unwrap());
        let err = f.resolver.resolve(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn cookie_is_read_from_headers() {
        let f = fixture(CountingVerifier::default());
        let user = seed(&f.store, "nurse@clinic.org", false).await;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "realm=x; session=nurse@clinic.org".parse().unwrap());
        let resolved = f.resolver.resolve(&headers).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn each_failure_maps_to_its_reason() {
        let f = fixture(CountingVerifier::default());
        seed(&f.store, "off@clinic.org", true).await;

        assert!(matches!(
            f.resolver.resolve_token("bad").await,
            Err(AuthError::InvalidCredential(_))
        ));
        assert!(matches!(
            f.resolver.resolve_token("no-email").await,
            Err(AuthError::MalformedClaims)
        ));
        assert!(matches!(
            f.resolver.resolve_token("ghost@clinic.org").await,
            Err(AuthError::UserNotFound(_))
        ));
        assert!(matches!(
            f.resolver.resolve_token("off@clinic.org").await,
            Err(AuthError::UserDisabled(_))
        ));
        // Disabled users are rejected before any revocation traffic.
        assert_eq!(f.verifier.revocation_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn revocation_checked_once_per_ttl_window() {
        let f = fixture(CountingVerifier::default());
        seed(&f.store, "tracer@health.gov", false).await;

        // Never checked before: the first request pays for the check.
        f.resolver.resolve_token("tracer@health.gov").await.unwrap();
        assert_eq!(f.verifier.revocation_checks.load(Ordering::SeqCst), 1);
        let stored = f
            .store
            .find_user_by_email("tracer@health.gov")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_revoke_check, f.clock.now());

        // Inside the window: no further checks.
        f.clock.advance(chrono::Duration::seconds(299));
        f.resolver.resolve_token("tracer@health.gov").await.unwrap();
        f.resolver.resolve_token("tracer@health.gov").await.unwrap();
        assert_eq!(f.verifier.revocation_checks.load(Ordering::SeqCst), 1);

        // Window elapsed: exactly one more.
        f.clock.advance(chrono::Duration::seconds(2));
        f.resolver.resolve_token("tracer@health.gov").await.unwrap();
        assert_eq!(f.verifier.revocation_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn revoked_session_fails_and_timestamp_stays() {
        let f = fixture(CountingVerifier {
            revoked: true,
            ..Default::default()
        });
        let user = seed(&f.store, "tracer@health.gov", false).await;

        let err = f.resolver.resolve_token("tracer@health.gov").await.unwrap_err();
        assert!(matches!(err, AuthError::RevocationCheckFailed(_)));
        assert_eq!(f.verifier.revocation_checks.load(Ordering::SeqCst), 1);

        let stored = f
            .store
            .find_user_by_email("tracer@health.gov")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_revoke_check, user.last_revoke_check);
    }

    #[tokio::test]
    async fn failed_persist_fails_closed() {
        let inner = InMemoryStore::new();
        seed(&inner, "tracer@health.gov", false).await;
        let store = ScriptedStore::new(inner);
        store.fail_user_writes();
        let resolver = SessionResolver::new(
            Arc::new(store),
            Arc::new(CountingVerifier::default()),
            Arc::new(FixedClock::new(Utc::now())),
            TTL,
        );

        let err = resolver.resolve_token("tracer@health.gov").await.unwrap_err();
        assert!(matches!(err, AuthError::RevocationCheckFailed(_)));
    }

    /// Disables the user in the store while the revocation call is in flight.
    struct DisableDuringCheck {
        store: Arc<InMemoryStore>,
        inner: CountingVerifier,
    }

    #[async_trait]
    impl IdentityVerifier for DisableDuringCheck {
        async fn verify(&self, token: &str) -> Result<SessionClaims, IdentityError> {
            self.inner.verify(token).await
        }

        async fn verify_and_check_revocation(
            &self,
            token: &str,
        ) -> Result<SessionClaims, IdentityError> {
            let mut user = self
                .store
                .find_user_by_email(token)
                .await
                .unwrap()
                .unwrap();
            user.disabled = true;
            self.store.save_user(&user).await.unwrap();
            self.inner.verify_and_check_revocation(token).await
        }
    }

    #[tokio::test]
    async fn disable_during_revocation_check_is_kept() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "tracer@health.gov", false).await;
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let resolver = SessionResolver::new(
            store.clone(),
            Arc::new(DisableDuringCheck {
                store: store.clone(),
                inner: CountingVerifier::default(),
            }),
            clock.clone(),
            TTL,
        );

        let err = resolver.resolve_token("tracer@health.gov").await.unwrap_err();
        assert!(matches!(err, AuthError::UserDisabled(_)));

        let stored = store
            .find_user_by_email("tracer@health.gov")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.disabled);
        assert_eq!(stored.last_revoke_check, clock.now());

        // Inside the TTL window the next request skips the check and still
        // sees the disabled flag.
        let err = resolver.resolve_token("tracer@health.gov").await.unwrap_err();
        assert!(matches!(err, AuthError::UserDisabled(_)));
    }

    #[tokio::test]
    async fn store_outage_is_a_store_error() {
        let inner = InMemoryStore::new();
        seed(&inner, "tracer@health.gov", false).await;
        let store = ScriptedStore::new(inner);
        store.fail_reads();
        let resolver = SessionResolver::new(
            Arc::new(store),
            Arc::new(CountingVerifier::default()),
            Arc::new(FixedClock::new(Utc::now())),
            TTL,
        );

        let err = resolver.resolve_token("tracer@health.gov").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fakes shared by unit tests across modules.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{ApiKeyDigester, IdentityError, IdentityVerifier, SessionClaims};
use crate::clock::FixedClock;
use crate::config::{Config, SESSION_HMAC_SECRET_ENV};
use crate::notify::{ChannelError, ChannelProvider, NotificationChannel};
use crate::state::{AppState, Components};
use crate::storage::{
    AuthorizedApp, CredentialStore, InMemoryStore, Realm, StoreError, StoreResult, User,
    VerificationCode,
};

pub const TEST_HMAC_SECRET: &str = "test-session-secret";
pub const TEST_API_KEY_SECRET: &[u8] = b"test-api-key-secret";

/// Identity provider that treats the token itself as the email claim.
///
/// `"bad"` fails verification and `"no-email"` verifies without an email.
#[derive(Default)]
pub struct CountingVerifier {
    pub revocation_checks: AtomicUsize,
    pub revoked: bool,
}

#[async_trait]
impl IdentityVerifier for CountingVerifier {
    async fn verify(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        match token {
            "bad" => Err(IdentityError::Invalid("signature".to_string())),
            "no-email" => Ok(SessionClaims::default()),
            _ => serde_json::from_value(json!({ "email": token }))
                .map_err(|e| IdentityError::Invalid(e.to_string())),
        }
    }

    async fn verify_and_check_revocation(
        &self,
        token: &str,
    ) -> Result<SessionClaims, IdentityError> {
        self.revocation_checks.fetch_add(1, Ordering::SeqCst);
        if self.revoked {
            return Err(IdentityError::Revoked);
        }
        self.verify(token).await
    }
}

/// In-memory store with injectable faults.
pub struct ScriptedStore {
    inner: InMemoryStore,
    conflicts_left: AtomicUsize,
    insert_attempts: AtomicUsize,
    fail_deletes: AtomicBool,
    fail_user_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl ScriptedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            conflicts_left: AtomicUsize::new(0),
            insert_attempts: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_user_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Report the next `n` code inserts as conflicts.
    pub fn force_conflicts(&self, n: usize) {
        self.conflicts_left.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn fail_user_writes(&self) {
        self.fail_user_writes.store(true, Ordering::SeqCst);
    }

    /// Fail every user, realm and app lookup.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound("store offline".to_string()));
        }
        Ok(())
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub async fn code_count(&self) -> usize {
        self.inner.code_count().await
    }
}

#[async_trait]
impl CredentialStore for ScriptedStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check_reads()?;
        self.inner.find_user_by_email(email).await
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        if self.fail_user_writes.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound("user table unavailable".to_string()));
        }
        self.inner.save_user(user).await
    }

    async fn advance_revoke_check(
        &self,
        email: &str,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        if self.fail_user_writes.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound("user table unavailable".to_string()));
        }
        self.inner.advance_revoke_check(email, checked_at).await
    }

    async fn find_realm(&self, realm_id: Uuid) -> StoreResult<Option<Realm>> {
        self.check_reads()?;
        self.inner.find_realm(realm_id).await
    }

    async fn list_realms(&self) -> StoreResult<Vec<Realm>> {
        self.inner.list_realms().await
    }

    async fn save_realm(&self, realm: &Realm) -> StoreResult<()> {
        self.inner.save_realm(realm).await
    }

    async fn find_app_by_key_digest(&self, digest: &str) -> StoreResult<Option<AuthorizedApp>> {
        self.check_reads()?;
        self.inner.find_app_by_key_digest(digest).await
    }

    async fn save_app(&self, app: &AuthorizedApp) -> StoreResult<()> {
        self.inner.save_app(app).await
    }

    async fn insert_code_if_absent(
        &self,
        record: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(StoreError::Conflict(format!("Verification code {}", record.code)));
        }
        self.inner.insert_code_if_absent(record, now).await
    }

    async fn find_code(&self, code: &str) -> StoreResult<Option<VerificationCode>> {
        self.inner.find_code(code).await
    }

    async fn delete_code(&self, code: &str) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound(format!("Verification code {code}")));
        }
        self.inner.delete_code(code).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Channel that records messages and optionally fails every send.
pub struct RecordingChannel {
    fail: bool,
    sent: tokio::sync::Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Default::default(),
        }
    }

    pub fn delivering() -> Self {
        Self {
            fail: false,
            sent: Default::default(),
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::Rejected(503));
        }
        self.sent
            .lock()
            .await
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

/// Hands out one channel to every realm that has SMS settings.
#[derive(Default)]
pub struct StaticChannels {
    channel: Mutex<Option<Arc<dyn NotificationChannel>>>,
}

impl StaticChannels {
    pub fn set(&self, channel: Arc<dyn NotificationChannel>) {
        if let Ok(mut slot) = self.channel.lock() {
            *slot = Some(channel);
        }
    }
}

impl ChannelProvider for StaticChannels {
    fn channel_for(&self, realm: &Realm) -> Option<Arc<dyn NotificationChannel>> {
        realm.sms.as_ref()?;
        self.channel.lock().ok()?.clone()
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|name| (name == SESSION_HMAC_SECRET_ENV).then(|| TEST_HMAC_SECRET.to_string()))
        .unwrap()
}

/// Fully wired state over fakes.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<ScriptedStore>,
    pub verifier: Arc<CountingVerifier>,
    pub clock: Arc<FixedClock>,
    pub channels: Arc<StaticChannels>,
}

impl TestApp {
    pub fn with_verifier(verifier: CountingVerifier) -> Self {
        let verifier = Arc::new(verifier);
        Self::build(verifier.clone(), verifier)
    }

    pub fn with_identity(identity: Arc<dyn IdentityVerifier>) -> Self {
        Self::build(identity, Arc::new(CountingVerifier::default()))
    }

    fn build(identity: Arc<dyn IdentityVerifier>, verifier: Arc<CountingVerifier>) -> Self {
        let store = Arc::new(ScriptedStore::new(InMemoryStore::new()));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let channels = Arc::new(StaticChannels::default());
        let state = AppState::new(
            Components {
                store: store.clone(),
                identity,
                channels: channels.clone(),
                clock: clock.clone(),
                api_keys: ApiKeyDigester::new(TEST_API_KEY_SECRET).unwrap(),
            },
            &test_config(),
        );
        Self {
            state,
            store,
            verifier,
            clock,
            channels,
        }
    }

    /// Create a realm with an app named "lab" holding `api_key`.
    pub async fn seed_app(&self, api_key: &str, disabled: bool) -> Realm {
        let realm = Realm::new("Lab realm");
        self.store.save_realm(&realm).await.unwrap();
        self.store
            .save_app(&AuthorizedApp {
                id: Uuid::new_v4(),
                name: "lab".to_string(),
                realm_id: realm.id,
                api_key_digest: self.state.api_keys.digest(api_key),
                disabled,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        realm
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Store
//!
//! Persistence for users, realms, authorized apps and verification codes.
//!
//! The service holds no cross-request mutable state of its own: uniqueness
//! of live codes and monotonicity of `last_revoke_check` are enforced here,
//! inside a single store operation, never by locks taken in the caller.
//!
//! ## Backends
//!
//! - [`InMemoryStore`] - process-local tables, used for development and tests
//! - [`RedbStore`] - embedded ACID database (redb) under `DATA_DIR`

pub mod database;
pub mod memory;
pub mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use database::RedbStore;
pub use memory::InMemoryStore;
pub use records::{
    normalize_email, AuthorizedApp, CodeIssuer, Realm, SmsSettings, User, VerificationCode,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A live record already occupies the key.
    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store consulted by the authorization middlewares and the
/// issuance engine.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by (normalized) email address.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Create or update a user.
    ///
    /// `last_revoke_check` is merged monotonically: a stale write never
    /// moves it backwards.
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Move a user's `last_revoke_check` forward to `checked_at` and return
    /// the stored user. No other field is written.
    ///
    /// Returns [`StoreError::NotFound`] if the user no longer exists.
    async fn advance_revoke_check(
        &self,
        email: &str,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<User>;

    async fn find_realm(&self, realm_id: Uuid) -> StoreResult<Option<Realm>>;

    async fn list_realms(&self) -> StoreResult<Vec<Realm>>;

    async fn save_realm(&self, realm: &Realm) -> StoreResult<()>;

    async fn find_app_by_key_digest(&self, digest: &str) -> StoreResult<Option<AuthorizedApp>>;

    async fn save_app(&self, app: &AuthorizedApp) -> StoreResult<()>;

    /// Persist a new code unless a live code with the same value exists.
    ///
    /// An existing record that expired at or before `now` is replaced.
    /// Returns [`StoreError::Conflict`] when the value is taken.
    async fn insert_code_if_absent(
        &self,
        record: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn find_code(&self, code: &str) -> StoreResult<Option<VerificationCode>>;

    /// Remove a code. Returns [`StoreError::NotFound`] if it does not exist.
    async fn delete_code(&self, code: &str) -> StoreResult<()>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> StoreResult<()>;
}

fn advance_check(user: &mut User, checked_at: DateTime<Utc>) {
    if checked_at > user.last_revoke_check {
        user.last_revoke_check = checked_at;
    }
}

/// Merge an incoming user write with the stored version.
fn merge_user(stored: Option<&User>, incoming: &User) -> User {
    let mut merged = incoming.clone();
    merged.email = normalize_email(&incoming.email);
    if let Some(stored) = stored {
        if stored.last_revoke_check > merged.last_revoke_check {
            merged.last_revoke_check = stored.last_revoke_check;
        }
    }
    merged
}

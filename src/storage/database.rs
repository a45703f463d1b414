// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: normalized email → serialized User
//! - `realms`: realm UUID → serialized Realm
//! - `apps`: API key digest → serialized AuthorizedApp
//! - `codes`: verification code → serialized VerificationCode
//!
//! redb admits a single write transaction at a time, so each
//! read-check-write below is atomic with respect to concurrent requests.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{
    advance_check, merge_user, normalize_email, AuthorizedApp, CredentialStore, Realm, StoreError, StoreResult,
    User, VerificationCode,
};

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const REALMS: TableDefinition<&str, &[u8]> = TableDefinition::new("realms");
const APPS: TableDefinition<&str, &[u8]> = TableDefinition::new("apps");
const CODES: TableDefinition<&str, &[u8]> = TableDefinition::new("codes");

/// File name of the database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "verification.redb";

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(REALMS)?;
            let _ = write_txn.open_table(APPS)?;
            let _ = write_txn.open_table(CODES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> StoreResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let json = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(key, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for RedbStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.get_json(USERS, &normalize_email(email))
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let key = normalize_email(&user.email);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            let stored: Option<User> = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let merged = merge_user(stored.as_ref(), user);
            let json = serde_json::to_vec(&merged)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn advance_revoke_check(
        &self,
        email: &str,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let key = normalize_email(email);
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut table = write_txn.open_table(USERS)?;
            let mut user: User = match table.get(key.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("User {email}"))),
            };
            advance_check(&mut user, checked_at);
            let json = serde_json::to_vec(&user)?;
            table.insert(key.as_str(), json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    async fn find_realm(&self, realm_id: Uuid) -> StoreResult<Option<Realm>> {
        self.get_json(REALMS, &realm_id.to_string())
    }

    async fn list_realms(&self) -> StoreResult<Vec<Realm>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REALMS)?;
        let mut realms = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            realms.push(serde_json::from_slice::<Realm>(value.value())?);
        }
        realms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(realms)
    }

    async fn save_realm(&self, realm: &Realm) -> StoreResult<()> {
        self.put_json(REALMS, &realm.id.to_string(), realm)
    }

    async fn find_app_by_key_digest(&self, digest: &str) -> StoreResult<Option<AuthorizedApp>> {
        self.get_json(APPS, digest)
    }

    async fn save_app(&self, app: &AuthorizedApp) -> StoreResult<()> {
        self.put_json(APPS, &app.api_key_digest, app)
    }

    async fn insert_code_if_absent(
        &self,
        record: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CODES)?;
            let taken = match table.get(record.code.as_str())? {
                Some(value) => {
                    let existing: VerificationCode = serde_json::from_slice(value.value())?;
                    existing.is_live(now)
                }
                None => false,
            };
            if taken {
                return Err(StoreError::Conflict(format!(
                    "Verification code {}",
                    record.code
                )));
            }
            table.insert(record.code.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn find_code(&self, code: &str) -> StoreResult<Option<VerificationCode>> {
        self.get_json(CODES, code)
    }

    async fn delete_code(&self, code: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CODES)?;
            let removed = table.remove(code)?.is_some();
            removed
        };
        if !removed {
            return Err(StoreError::NotFound(format!("Verification code {code}")));
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(CODES)?;
        Ok(())
    }
}

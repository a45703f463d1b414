// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    advance_check, merge_user, normalize_email, AuthorizedApp, CredentialStore, Realm, StoreError, StoreResult,
    User, VerificationCode,
};

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, User>>,
    realms: RwLock<HashMap<Uuid, Realm>>,
    apps: RwLock<HashMap<String, AuthorizedApp>>,
    codes: RwLock<HashMap<String, VerificationCode>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored codes, live or expired.
    pub async fn code_count(&self) -> usize {
        self.codes.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&normalize_email(email)).cloned())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let key = normalize_email(&user.email);
        let merged = merge_user(users.get(&key), user);
        users.insert(key, merged);
        Ok(())
    }

    async fn advance_revoke_check(
        &self,
        email: &str,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&normalize_email(email))
            .ok_or_else(|| StoreError::NotFound(format!("User {email}")))?;
        advance_check(user, checked_at);
        Ok(user.clone())
    }

    async fn find_realm(&self, realm_id: Uuid) -> StoreResult<Option<Realm>> {
        Ok(self.realms.read().await.get(&realm_id).cloned())
    }

    async fn list_realms(&self) -> StoreResult<Vec<Realm>> {
        let mut realms: Vec<Realm> = self.realms.read().await.values().cloned().collect();
        realms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(realms)
    }

    async fn save_realm(&self, realm: &Realm) -> StoreResult<()> {
        self.realms.write().await.insert(realm.id, realm.clone());
        Ok(())
    }

    async fn find_app_by_key_digest(&self, digest: &str) -> StoreResult<Option<AuthorizedApp>> {
        Ok(self.apps.read().await.get(digest).cloned())
    }

    async fn save_app(&self, app: &AuthorizedApp) -> StoreResult<()> {
        self.apps
            .write()
            .await
            .insert(app.api_key_digest.clone(), app.clone());
        Ok(())
    }

    async fn insert_code_if_absent(
        &self,
        record: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut codes = self.codes.write().await;
        if codes.get(&record.code).is_some_and(|existing| existing.is_live(now)) {
            return Err(StoreError::Conflict(format!("Verification code {}", record.code)));
        }
        codes.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn find_code(&self, code: &str) -> StoreResult<Option<VerificationCode>> {
        Ok(self.codes.read().await.get(code).cloned())
    }

    async fn delete_code(&self, code: &str) -> StoreResult<()> {
        match self.codes.write().await.remove(code) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("Verification code {code}"))),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestType;
    use crate::storage::CodeIssuer;
    use chrono::Duration;

    fn code(value: &str, expires_at: DateTime<Utc>) -> VerificationCode {
        VerificationCode {
            code: value.to_string(),
            expires_at,
            test_type: TestType::Confirmed,
            symptom_date: None,
            issued_by: CodeIssuer::User(Uuid::new_v4()),
            realm_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn live_code_conflicts() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        store
            .insert_code_if_absent(&code("12345678", now + Duration::hours(1)), now)
            .await
            .unwrap();

        let second = store
            .insert_code_if_absent(&code("12345678", now + Duration::hours(1)), now)
            .await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn expired_code_is_replaced() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        store
            .insert_code_if_absent(&code("11112222", now - Duration::seconds(1)), now)
            .await
            .unwrap();

        let fresh = code("11112222", now + Duration::hours(1));
        store.insert_code_if_absent(&fresh, now).await.unwrap();

        let stored = store.find_code("11112222").await.unwrap().unwrap();
        assert_eq!(stored.expires_at, fresh.expires_at);
    }

    #[tokio::test]
    async fn delete_missing_code_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.delete_code("00000000").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn user_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        let user = User::new("Nurse@Clinic.org", "Nurse");
        store.save_user(&user).await.unwrap();

        let found = store
            .find_user_by_email("nurse@clinic.org")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn realms_listed_by_name() {
        let store = InMemoryStore::new();
        store.save_realm(&Realm::new("Zeta County")).await.unwrap();
        store.save_realm(&Realm::new("Alpha County")).await.unwrap();

        let names: Vec<String> = store
            .list_realms()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Alpha County", "Zeta County"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_of_one_value_have_one_winner() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let now = Utc::now();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_code_if_absent(&code("24681357", now + Duration::hours(1)), now)
                        .await
                })
            })
            .collect();

        let mut won = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => won += 1,
                Err(StoreError::Conflict(_)) => {}
                Err(other) => panic!("unexpected store error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(store.code_count().await, 1);
    }

    #[tokio::test]
    async fn revoke_check_advance_touches_only_the_timestamp() {
        let store = InMemoryStore::new();
        let user = User::new("tracer@health.gov", "Tracer");
        store.save_user(&user).await.unwrap();

        let mut disabled = user.clone();
        disabled.disabled = true;
        store.save_user(&disabled).await.unwrap();

        let checked_at = Utc::now();
        let current = store
            .advance_revoke_check("Tracer@health.gov", checked_at)
            .await
            .unwrap();
        assert!(current.disabled);
        assert_eq!(current.last_revoke_check, checked_at);

        // Never backwards.
        let current = store
            .advance_revoke_check("tracer@health.gov", checked_at - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(current.last_revoke_check, checked_at);

        assert!(matches!(
            store.advance_revoke_check("ghost@health.gov", checked_at).await,
            Err(StoreError::NotFound(_))
        ));
    }
}

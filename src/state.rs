// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{ApiKeyDigester, IdentityVerifier, SessionResolver};
use crate::clock::Clock;
use crate::config::Config;
use crate::issuance::IssuanceEngine;
use crate::notify::ChannelProvider;
use crate::storage::CredentialStore;

/// Shared, immutable per-process state. Request data never lives here.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub sessions: Arc<SessionResolver>,
    pub api_keys: Arc<ApiKeyDigester>,
    pub issuance: Arc<IssuanceEngine>,
    /// Database directory, reported by the readiness probe.
    pub data_dir: Option<PathBuf>,
}

/// Collaborators the state is wired from.
pub struct Components {
    pub store: Arc<dyn CredentialStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub channels: Arc<dyn ChannelProvider>,
    pub clock: Arc<dyn Clock>,
    pub api_keys: ApiKeyDigester,
}

impl AppState {
    pub fn new(components: Components, config: &Config) -> Self {
        let Components {
            store,
            identity,
            channels,
            clock,
            api_keys,
        } = components;

        let sessions = SessionResolver::new(
            store.clone(),
            identity.clone(),
            clock.clone(),
            config.session.revoke_check_ttl,
        );
        let issuance = IssuanceEngine::new(store.clone(), channels, clock, config.issue.clone());

        Self {
            store,
            identity,
            sessions: Arc::new(sessions),
            api_keys: Arc::new(api_keys),
            issuance: Arc::new(issuance),
            data_dir: config.data_dir.as_ref().map(PathBuf::from),
        }
    }
}

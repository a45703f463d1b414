// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound delivery of verification codes to patients.
//!
//! A realm with [`SmsSettings`] gets an [`HttpSmsChannel`] that POSTs
//! `{"from", "to", "body"}` to its gateway. Realms without settings have no
//! channel, and issuance with a phone number is refused for them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::storage::{Realm, SmsSettings};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected message with HTTP {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError>;
}

/// Looks up the channel configured for a realm.
pub trait ChannelProvider: Send + Sync {
    fn channel_for(&self, realm: &Realm) -> Option<Arc<dyn NotificationChannel>>;
}

/// Builds HTTP SMS channels from realm settings, sharing one client.
#[derive(Clone)]
pub struct HttpChannelProvider {
    client: reqwest::Client,
}

impl HttpChannelProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelProvider for HttpChannelProvider {
    fn channel_for(&self, realm: &Realm) -> Option<Arc<dyn NotificationChannel>> {
        let settings = realm.sms.as_ref()?;
        Some(Arc::new(HttpSmsChannel::new(self.client.clone(), settings)))
    }
}

#[derive(Serialize)]
struct OutboundSms<'a> {
    from: &'a str,
    to: &'a str,
    body: &'a str,
}

pub struct HttpSmsChannel {
    client: reqwest::Client,
    gateway_url: String,
    from_number: String,
}

impl HttpSmsChannel {
    pub fn new(client: reqwest::Client, settings: &SmsSettings) -> Self {
        Self {
            client,
            gateway_url: settings.gateway_url.clone(),
            from_number: settings.from_number.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for HttpSmsChannel {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(&OutboundSms {
                from: &self.from_number,
                to: recipient,
                body: message,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChannelError::Rejected(response.status().as_u16()));
        }
        tracing::debug!(gateway = %self.gateway_url, "SMS accepted by gateway");
        Ok(())
    }
}

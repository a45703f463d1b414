// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code issuance engine: validation, generate-and-persist, dispatch.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Local, NaiveDate, Utc};

use super::code::generate_code;
use crate::auth::{Principal, RequestContext};
use crate::clock::Clock;
use crate::config::IssueConfig;
use crate::error::ApiError;
use crate::models::{IssueCodeRequest, IssueCodeResponse, TestType};
use crate::notify::{ChannelError, ChannelProvider};
use crate::storage::{CredentialStore, StoreError, VerificationCode};

const GENERATION_FAILED_MESSAGE: &str =
    "error generating verification, wait a moment and try again";
const DISPATCH_FAILED_MESSAGE: &str = "failed to send sms, wait a moment and try again";

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("no realm selected")]
    NoRealmSelected,

    #[error("phone provided, but no SMS provider is configured")]
    NoChannel,

    #[error("invalid test type: {0}")]
    InvalidTestType(String),

    #[error("invalid symptom onset date: {value} is not a YYYY-MM-DD date, it must be on or after {min} and on or before {max}.")]
    MalformedSymptomDate {
        value: String,
        min: NaiveDate,
        max: NaiveDate,
    },

    #[error("Invalid symptom onset date: {date} must be on or after {min} and on or before {max}.")]
    SymptomDateOutOfRange {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    #[error("no free verification code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("code duration {0:?} does not yield a representable expiry")]
    ExpiryOutOfRange(std::time::Duration),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to send sms: {0}")]
    Dispatch(#[source] ChannelError),
}

impl IssuanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IssuanceError::Unauthorized => StatusCode::UNAUTHORIZED,
            IssuanceError::NoRealmSelected
            | IssuanceError::NoChannel
            | IssuanceError::InvalidTestType(_)
            | IssuanceError::MalformedSymptomDate { .. }
            | IssuanceError::SymptomDateOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            IssuanceError::CodeSpaceExhausted { .. }
            | IssuanceError::ExpiryOutOfRange(_)
            | IssuanceError::Store(_)
            | IssuanceError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Validation failures are specific; internal failures only say "try again".
    pub fn user_message(&self) -> String {
        match self {
            IssuanceError::CodeSpaceExhausted { .. }
            | IssuanceError::ExpiryOutOfRange(_)
            | IssuanceError::Store(_) => GENERATION_FAILED_MESSAGE.to_string(),
            IssuanceError::Dispatch(_) => DISPATCH_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        ApiError::new(err.status_code(), err.user_message())
    }
}

/// A persisted (and, when requested, delivered) code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedCode> for IssueCodeResponse {
    fn from(issued: IssuedCode) -> Self {
        Self {
            code: issued.code,
            expires_at: issued
                .expires_at
                .format("%a, %d %b %Y %H:%M:%S UTC")
                .to_string(),
            expires_at_timestamp: issued.expires_at.timestamp(),
        }
    }
}

/// Text sent to the patient.
pub fn sms_message(code: &str, expires_in_minutes: u64) -> String {
    format!(
        "Your exposure notifications verification code is {code}. \
         Enter this code into your exposure notifications app. \
         Do NOT share this code with anyone. \
         This code expires in {expires_in_minutes} minutes."
    )
}

/// Inclusive `(min, max)` symptom onset dates accepted at `now`.
///
/// `max` is today in local time; `min` is the local date `max_age` earlier.
pub fn symptom_window(now: DateTime<Utc>, max_age: std::time::Duration) -> (NaiveDate, NaiveDate) {
    let local = now.with_timezone(&Local);
    let max = local.date_naive();
    let min = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| local.checked_sub_signed(age))
        .map(|earliest| earliest.date_naive())
        .unwrap_or(NaiveDate::MIN);
    (min, max)
}

pub struct IssuanceEngine {
    store: Arc<dyn CredentialStore>,
    channels: Arc<dyn ChannelProvider>,
    clock: Arc<dyn Clock>,
    config: IssueConfig,
}

impl IssuanceEngine {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        channels: Arc<dyn ChannelProvider>,
        clock: Arc<dyn Clock>,
        config: IssueConfig,
    ) -> Self {
        Self {
            store,
            channels,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &IssueConfig {
        &self.config
    }

    /// Issue a code for the principal in `ctx`. Every failure is logged here.
    pub async fn issue(
        &self,
        ctx: &RequestContext,
        request: &IssueCodeRequest,
    ) -> Result<IssuedCode, IssuanceError> {
        let result = self.try_issue(ctx, request).await;
        match &result {
            Ok(issued) => tracing::info!(
                issuer = ?ctx.principal.issuer(),
                expires_at = %issued.expires_at,
                "Verification code issued"
            ),
            Err(err) if err.status_code().is_server_error() => {
                tracing::error!(error = %err, "Verification code issuance failed")
            }
            Err(err) => tracing::warn!(error = %err, "Verification code request rejected"),
        }
        result
    }

    async fn try_issue(
        &self,
        ctx: &RequestContext,
        request: &IssueCodeRequest,
    ) -> Result<IssuedCode, IssuanceError> {
        let realm = match &ctx.principal {
            Principal::App(_) => ctx
                .principal
                .resolve_realm(ctx.realm.as_ref())
                .ok_or(IssuanceError::Unauthorized)?,
            Principal::User(_) => ctx
                .principal
                .resolve_realm(ctx.realm.as_ref())
                .ok_or(IssuanceError::NoRealmSelected)?,
        };
        if !ctx.principal.can_issue_in(realm.id) {
            return Err(IssuanceError::Unauthorized);
        }

        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty());
        let channel = match phone {
            Some(_) => Some(
                self.channels
                    .channel_for(realm)
                    .ok_or(IssuanceError::NoChannel)?,
            ),
            None => None,
        };

        let test_type: TestType = request
            .test_type
            .parse()
            .map_err(|_| IssuanceError::InvalidTestType(request.test_type.trim().to_lowercase()))?;

        let now = self.clock.now();
        let symptom_date = self.check_symptom_date(request.symptom_date.as_deref(), now)?;
        let expires_at = chrono::Duration::from_std(self.config.code_duration)
            .ok()
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or(IssuanceError::ExpiryOutOfRange(self.config.code_duration))?;

        let template = VerificationCode {
            code: String::new(),
            expires_at,
            test_type,
            symptom_date,
            issued_by: ctx.principal.issuer(),
            realm_id: realm.id,
            created_at: now,
        };
        let code = self.persist_new_code(template, now).await?;

        if let (Some(phone), Some(channel)) = (phone, channel) {
            let message = sms_message(&code, self.config.code_duration.as_secs() / 60);
            if let Err(err) = channel.send(phone, &message).await {
                // The patient never got the code, so it must not stay usable.
                if let Err(delete_err) = self.store.delete_code(&code).await {
                    tracing::error!(
                        error = %delete_err,
                        realm_id = %realm.id,
                        "Failed to roll back undelivered verification code"
                    );
                }
                return Err(IssuanceError::Dispatch(err));
            }
        }

        Ok(IssuedCode { code, expires_at })
    }

    fn check_symptom_date(
        &self,
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<NaiveDate>, IssuanceError> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        let (min, max) = symptom_window(now, self.config.allowed_symptom_age);
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            IssuanceError::MalformedSymptomDate {
                value: raw.to_string(),
                min,
                max,
            }
        })?;
        if date < min || date > max {
            return Err(IssuanceError::SymptomDateOutOfRange { date, min, max });
        }
        Ok(Some(date))
    }

    /// Generate candidates until one persists or the attempt budget runs out.
    async fn persist_new_code(
        &self,
        mut record: VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<String, IssuanceError> {
        let attempts = self.config.collision_retry_count.max(1);
        for attempt in 1..=attempts {
            record.code = generate_code(self.config.code_digits);
            match self.store.insert_code_if_absent(&record, now).await {
                Ok(()) => return Ok(record.code),
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(attempt, "Verification code collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(IssuanceError::CodeSpaceExhausted { attempts })
    }
}

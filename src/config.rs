// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed [`Config`] loaded once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `verification.redb` | In-memory store |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key | Plain HTTP |
//! | `SESSION_JWKS_URL` | JWKS endpoint for session cookie keys | Required for production |
//! | `SESSION_ISSUER` | Expected session `iss` claim | Optional |
//! | `SESSION_AUDIENCE` | Expected session `aud` claim | Optional |
//! | `SESSION_HMAC_SECRET` | Development-only HS256 secret | Optional |
//! | `REVOCATION_URL` | Session revocation authority | Signature re-check only |
//! | `REVOKE_CHECK_TTL_SECS` | Revocation re-check period | `300` |
//! | `API_KEY_SECRET` | HMAC key for API key digests | Random per process |
//! | `CODE_DIGITS` | Verification code length | `8` |
//! | `CODE_DURATION_SECS` | Verification code lifetime | `3600` |
//! | `ALLOWED_SYMPTOM_AGE_DAYS` | Oldest accepted symptom onset | `14` |
//! | `COLLISION_RETRY_COUNT` | Code collision retry budget | `6` |
//! | `BOOTSTRAP_ADMIN_EMAIL` | System admin created at startup | None |

use std::time::Duration;

use rand::RngCore;
use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory for the embedded database. When unset the service keeps all
/// state in memory, which is only suitable for development.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const SESSION_JWKS_URL_ENV: &str = "SESSION_JWKS_URL";
pub const SESSION_ISSUER_ENV: &str = "SESSION_ISSUER";
pub const SESSION_AUDIENCE_ENV: &str = "SESSION_AUDIENCE";

/// Shared secret for HS256 session cookies.
///
/// Only consulted when `SESSION_JWKS_URL` is unset. MUST NOT be used in
/// production deployments.
pub const SESSION_HMAC_SECRET_ENV: &str = "SESSION_HMAC_SECRET";

pub const REVOCATION_URL_ENV: &str = "REVOCATION_URL";
pub const REVOKE_CHECK_TTL_ENV: &str = "REVOKE_CHECK_TTL_SECS";
pub const API_KEY_SECRET_ENV: &str = "API_KEY_SECRET";

pub const CODE_DIGITS_ENV: &str = "CODE_DIGITS";
pub const CODE_DURATION_ENV: &str = "CODE_DURATION_SECS";
pub const ALLOWED_SYMPTOM_AGE_ENV: &str = "ALLOWED_SYMPTOM_AGE_DAYS";
pub const COLLISION_RETRY_COUNT_ENV: &str = "COLLISION_RETRY_COUNT";
pub const BOOTSTRAP_ADMIN_EMAIL_ENV: &str = "BOOTSTRAP_ADMIN_EMAIL";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REVOKE_CHECK_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CODE_DIGITS: usize = 8;
pub const DEFAULT_CODE_DURATION: Duration = Duration::from_secs(3600);
pub const DEFAULT_ALLOWED_SYMPTOM_AGE_DAYS: u32 = 14;
pub const DEFAULT_COLLISION_RETRY_COUNT: u32 = 6;

pub const MIN_CODE_DIGITS: usize = 6;
pub const MAX_CODE_DIGITS: usize = 20;
pub const MAX_CODE_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const MAX_ALLOWED_SYMPTOM_AGE_DAYS: u32 = 365;

/// Configuration errors are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("{name} is out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },

    #[error("either SESSION_JWKS_URL or SESSION_HMAC_SECRET must be set")]
    MissingSessionKeys,

    #[error("{name} must use https: {url}")]
    InsecureUrl { name: &'static str, url: String },
}

/// Parameters of the code issuance engine.
#[derive(Debug, Clone)]
pub struct IssueConfig {
    pub code_digits: usize,
    pub code_duration: Duration,
    pub allowed_symptom_age: Duration,
    pub collision_retry_count: u32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            code_digits: DEFAULT_CODE_DIGITS,
            code_duration: DEFAULT_CODE_DURATION,
            allowed_symptom_age: days(DEFAULT_ALLOWED_SYMPTOM_AGE_DAYS),
            collision_retry_count: DEFAULT_COLLISION_RETRY_COUNT,
        }
    }
}

impl IssueConfig {
    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CODE_DIGITS..=MAX_CODE_DIGITS).contains(&self.code_digits) {
            return Err(ConfigError::OutOfRange {
                name: CODE_DIGITS_ENV,
                reason: format!(
                    "{} not in [{MIN_CODE_DIGITS}, {MAX_CODE_DIGITS}]",
                    self.code_digits
                ),
            });
        }
        if self.collision_retry_count == 0 {
            return Err(ConfigError::OutOfRange {
                name: COLLISION_RETRY_COUNT_ENV,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.code_duration.is_zero() || self.code_duration > MAX_CODE_DURATION {
            return Err(ConfigError::OutOfRange {
                name: CODE_DURATION_ENV,
                reason: format!(
                    "{}s not in [1, {}]",
                    self.code_duration.as_secs(),
                    MAX_CODE_DURATION.as_secs()
                ),
            });
        }
        if self.allowed_symptom_age.is_zero()
            || self.allowed_symptom_age > days(MAX_ALLOWED_SYMPTOM_AGE_DAYS)
        {
            return Err(ConfigError::OutOfRange {
                name: ALLOWED_SYMPTOM_AGE_ENV,
                reason: format!("must be between 1 and {MAX_ALLOWED_SYMPTOM_AGE_DAYS} days"),
            });
        }
        Ok(())
    }
}

/// Session cookie verification settings.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub hmac_secret: Option<String>,
    pub revocation_url: Option<String>,
    pub revoke_check_ttl: Duration,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<String>,
    pub log_json: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub session: SessionConfig,
    pub api_key_secret: Vec<u8>,
    pub issue: IssueConfig,
    pub bootstrap_admin_email: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let session = SessionConfig {
            jwks_url: get(SESSION_JWKS_URL_ENV)
                .map(|u| require_https(SESSION_JWKS_URL_ENV, u))
                .transpose()?,
            issuer: get(SESSION_ISSUER_ENV),
            audience: get(SESSION_AUDIENCE_ENV),
            hmac_secret: get(SESSION_HMAC_SECRET_ENV),
            revocation_url: get(REVOCATION_URL_ENV)
                .map(|u| require_https(REVOCATION_URL_ENV, u))
                .transpose()?,
            revoke_check_ttl: parse_or(get(REVOKE_CHECK_TTL_ENV), REVOKE_CHECK_TTL_ENV, 300)
                .map(Duration::from_secs)?,
        };
        if session.jwks_url.is_none() && session.hmac_secret.is_none() {
            return Err(ConfigError::MissingSessionKeys);
        }

        let issue = IssueConfig {
            code_digits: parse_or(get(CODE_DIGITS_ENV), CODE_DIGITS_ENV, DEFAULT_CODE_DIGITS)?,
            code_duration: parse_or(get(CODE_DURATION_ENV), CODE_DURATION_ENV, 3600)
                .map(Duration::from_secs)?,
            allowed_symptom_age: parse_or(
                get(ALLOWED_SYMPTOM_AGE_ENV),
                ALLOWED_SYMPTOM_AGE_ENV,
                DEFAULT_ALLOWED_SYMPTOM_AGE_DAYS,
            )
            .map(days)?,
            collision_retry_count: parse_or(
                get(COLLISION_RETRY_COUNT_ENV),
                COLLISION_RETRY_COUNT_ENV,
                DEFAULT_COLLISION_RETRY_COUNT,
            )?,
        };
        issue.validate()?;

        let api_key_secret = match get(API_KEY_SECRET_ENV) {
            Some(secret) => secret.into_bytes(),
            None => {
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?,
            data_dir: get(DATA_DIR_ENV),
            log_json: get(LOG_FORMAT_ENV).is_some_and(|f| f.eq_ignore_ascii_case("json")),
            tls_cert_path: get(TLS_CERT_PATH_ENV),
            tls_key_path: get(TLS_KEY_PATH_ENV),
            session,
            api_key_secret,
            issue,
            bootstrap_admin_email: get(BOOTSTRAP_ADMIN_EMAIL_ENV),
        })
    }
}

fn days(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 24 * 60 * 60)
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// Remote authorities are only reached over https; plain http is tolerated
/// for loopback so local fakes can be used during development.
fn require_https(name: &'static str, raw: String) -> Result<String, ConfigError> {
    let url = Url::parse(&raw).map_err(|_| ConfigError::Invalid {
        name,
        value: raw.clone(),
    })?;
    let loopback = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
    if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
        Ok(raw)
    } else {
        Err(ConfigError::InsecureUrl { name, url: raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[(SESSION_HMAC_SECRET_ENV, "dev-secret")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.issue.code_digits, 8);
        assert_eq!(config.issue.code_duration, Duration::from_secs(3600));
        assert_eq!(config.issue.allowed_symptom_age, days(14));
        assert_eq!(config.issue.collision_retry_count, 6);
        assert_eq!(config.session.revoke_check_ttl, DEFAULT_REVOKE_CHECK_TTL);
        assert_eq!(config.api_key_secret.len(), 32);
        assert!(!config.log_json);
    }

    #[test]
    fn session_keys_are_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingSessionKeys)));
    }

    #[test]
    fn jwks_url_must_be_https() {
        let err = load(&[(SESSION_JWKS_URL_ENV, "http://keys.example.com/jwks.json")]);
        assert!(matches!(err, Err(ConfigError::InsecureUrl { .. })));

        let ok = load(&[(SESSION_JWKS_URL_ENV, "https://keys.example.com/jwks.json")]);
        assert!(ok.is_ok());

        let local = load(&[(SESSION_JWKS_URL_ENV, "http://localhost:9000/jwks.json")]);
        assert!(local.is_ok());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = load(&[
            (SESSION_HMAC_SECRET_ENV, "dev-secret"),
            (CODE_DIGITS_ENV, "eight"),
        ]);
        assert!(matches!(err, Err(ConfigError::Invalid { name, .. }) if name == CODE_DIGITS_ENV));
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let err = load(&[
            (SESSION_HMAC_SECRET_ENV, "dev-secret"),
            (COLLISION_RETRY_COUNT_ENV, "0"),
        ]);
        assert!(matches!(err, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn code_digits_bounds() {
        let short = load(&[(SESSION_HMAC_SECRET_ENV, "s"), (CODE_DIGITS_ENV, "4")]);
        assert!(short.is_err());
        let ok = load(&[(SESSION_HMAC_SECRET_ENV, "s"), (CODE_DIGITS_ENV, "10")]).unwrap();
        assert_eq!(ok.issue.code_digits, 10);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = load(&[
            (SESSION_HMAC_SECRET_ENV, "s"),
            (CODE_DURATION_ENV, "1000000000000000"),
        ]);
        assert!(matches!(err, Err(ConfigError::OutOfRange { name, .. }) if name == CODE_DURATION_ENV));

        let err = load(&[(SESSION_HMAC_SECRET_ENV, "s"), (ALLOWED_SYMPTOM_AGE_ENV, "366")]);
        assert!(
            matches!(err, Err(ConfigError::OutOfRange { name, .. }) if name == ALLOWED_SYMPTOM_AGE_ENV)
        );

        let ok = load(&[(SESSION_HMAC_SECRET_ENV, "s"), (CODE_DURATION_ENV, "2592000")]);
        assert!(ok.is_ok());
    }

    #[test]
    fn json_log_format_is_case_insensitive() {
        let config = load(&[(SESSION_HMAC_SECRET_ENV, "s"), (LOG_FORMAT_ENV, "JSON")]).unwrap();
        assert!(config.log_json);
    }
}

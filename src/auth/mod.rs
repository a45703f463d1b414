// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Establishes who is calling, in which realm, with what privilege.
//!
//! ## Auth Flow
//!
//! 1. Browser sessions carry a signed `session` cookie minted by the
//!    identity provider; machine callers send `X-API-Key`
//! 2. The server:
//!    - Verifies the cookie (JWKS or development HMAC secret)
//!    - Loads the user by the `email` claim and rejects disabled users
//!    - Re-checks revocation with the authority once per TTL window
//!    - Binds the principal (and later the selected realm) into a
//!      [`RequestContext`] read by handlers
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Authentication failures are logged in detail but answered with a
//!   generic "Unauthorized"
//! - Revocation-check failures fail closed
//! - Clock skew tolerance is 60 seconds

pub mod api_key;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod middleware;
pub mod principal;
pub mod resolver;
pub mod session;

pub use api_key::ApiKeyDigester;
pub use error::AuthError;
pub use extractor::Auth;
pub use identity::{IdentityError, IdentityVerifier, SessionClaims};
pub use jwks::JwksManager;
pub use principal::{Principal, RequestContext};
pub use resolver::{SessionResolver, SESSION_COOKIE};
pub use session::SessionVerifier;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification Server - Exposure Notification Verification Codes
//!
//! Issues short-lived, single-use verification codes to public health
//! staff (session cookie) and lab systems (API key), scoped to realms.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session resolution and authorization middlewares
//! - `issuance` - Code generation, persistence and SMS dispatch
//! - `notify` - SMS delivery channels
//! - `storage` - Credential store (in-memory or redb)

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod issuance;
pub mod models;
pub mod notify;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

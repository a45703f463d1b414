// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Verification Code Issuance
//!
//! ## Lifecycle of one issuance
//!
//! ```text
//! Validating -> Generating -> Persisting -> Dispatching -> Issued
//!                   ^             |              |
//!                   +- conflict --+              +- failure -> RolledBack -> Failed
//! ```
//!
//! Uniqueness of live codes is enforced by the store's conditional insert;
//! the engine retries a bounded number of times on conflict.

pub mod code;
pub mod engine;

pub use code::generate_code;
pub use engine::{IssuanceEngine, IssuanceError, IssuedCode};

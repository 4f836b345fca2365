// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # sealgate-server-db
//!
//! Persistence for sealgate's asymmetric key records.
//!
//! [`KeyStore`] is the seam the key lifecycle manager depends on.
//! [`KeyRepository`] implements it on SQLite via sqlx and
//! [`InMemoryKeyStore`] on a process-local vector. Lookups return
//! `Result<Option<T>>`: absence is normal and the caller decides what it means.
//!
//! Use `#[tracing::instrument]` on repository methods, skipping `self` and any
//! argument that carries key material.

mod error;
pub mod key;
pub mod pool;

#[cfg(test)]
pub mod testing;

pub use error::{DbError, Result};
pub use key::{InMemoryKeyStore, KeyRecord, KeyRepository, KeyStore};
pub use pool::{create_pool, run_migrations};

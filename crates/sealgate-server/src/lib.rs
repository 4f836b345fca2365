// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sealgate HTTP server.
//!
//! Protected routes exchange payloads as envelopes: the client encrypts the
//! body under a fresh AES-256-GCM session key, wraps that key with the
//! server's published RSA key, and gets its response sealed with the same
//! session key. Handlers behind the envelope middleware only see plaintext.

pub mod api;
pub mod envelope;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod routes;

pub use api::{create_app_state, create_key_manager, create_router, AppState};
pub use error::ServerError;
pub use metrics::Metrics;
pub use sealgate_server_config::ServerConfig;

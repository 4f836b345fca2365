// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope interception pipeline.
//!
//! A protected request carries a JSON envelope: an AES-256-GCM ciphertext
//! plus the AES key wrapped under the server's published RSA key. The
//! middleware opens it before the handler runs, remembers the session key for
//! the lifetime of the request, and seals the response body with that same
//! key on the way out. Every failure collapses into one generic response.

pub mod client;
pub mod context;
pub mod error;
pub mod exempt;
pub mod middleware;
pub mod replay;
pub mod wire;

pub use client::{open_response, seal_request, seal_request_with_replay, SealedRequest};
pub use context::SessionKeyContext;
pub use error::{decryption_failed_response, DecryptionFailedBody, EnvelopeError};
pub use exempt::ExemptionMatcher;
pub use middleware::{envelope_layer, EnvelopeState};
pub use replay::{bind_replay_fields, ReplayGuard};
pub use wire::{RequestEnvelope, ResponseEnvelope};

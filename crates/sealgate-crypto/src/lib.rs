// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cryptographic primitives for the sealgate payload envelope.
//!
//! Everything here is stateless. Key records, rotation and the HTTP pipeline
//! live in the server crates and call into this crate for:
//!
//! - RSA keypair generation and PEM encoding ([`keypair`], [`pem`])
//! - RSA-OAEP-SHA-256 wrapping of session keys ([`wrap`])
//! - AES-256-GCM sealing and opening of payloads ([`aead`])
//! - Transport-safe base64url encoding ([`encoding`])
//!
//! # Example
//!
//! ```no_run
//! use sealgate_crypto::{aead, generate_keypair, wrap};
//!
//! let keypair = generate_keypair(2048).unwrap();
//! let session_key = aead::generate_session_key();
//!
//! let wrapped = wrap::wrap_key(keypair.public_key(), session_key.expose()).unwrap();
//! let sealed = aead::seal(&session_key, b"{\"hello\":\"world\"}", None).unwrap();
//!
//! let unwrapped = wrap::unwrap_session_key(keypair.private_key(), &wrapped).unwrap();
//! let plaintext = aead::open(&unwrapped, &sealed.nonce, &sealed.ciphertext, None).unwrap();
//! assert_eq!(plaintext.as_slice(), b"{\"hello\":\"world\"}");
//! ```

pub mod aead;
pub mod encoding;
pub mod error;
pub mod keypair;
pub mod pem;
pub mod secret;
pub mod wrap;

pub use aead::{SealedPayload, SessionKey, NONCE_SIZE, SESSION_KEY_SIZE, TAG_SIZE};
pub use error::{CryptoError, Result};
pub use keypair::{generate_keypair, KeyPair, MIN_RSA_BITS};
pub use secret::{Secret, SecretString, REDACTED};

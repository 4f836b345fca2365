// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for envelope cryptography.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors produced by the crypto primitives.
///
/// `Unwrap` and `Authentication` deliberately carry no detail: callers must not
/// be able to tell a padding failure from a key mismatch, or a bad tag from a
/// bad nonce.
#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("key generation failed: {0}")]
	KeyGeneration(String),

	#[error("encoding error: {0}")]
	Encoding(String),

	#[error("key wrap failed: {0}")]
	Wrap(String),

	#[error("key unwrap failed")]
	Unwrap,

	#[error("encryption failed: {0}")]
	Encryption(String),

	#[error("authentication failed")]
	Authentication,

	#[error("invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("invalid nonce size: expected {expected}, got {actual}")]
	InvalidNonceSize { expected: usize, actual: usize },
}

impl CryptoError {
	/// True for failures caused by untrusted input rather than by this process.
	pub fn is_input_error(&self) -> bool {
		matches!(
			self,
			CryptoError::Encoding(_)
				| CryptoError::Unwrap
				| CryptoError::Authentication
				| CryptoError::InvalidKeySize { .. }
				| CryptoError::InvalidNonceSize { .. }
		)
	}
}

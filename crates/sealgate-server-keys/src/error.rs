// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sealgate_crypto::CryptoError;
use sealgate_server_db::DbError;

/// Errors from the key lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
	/// The kid is unknown or its key has expired. The two cases are
	/// deliberately indistinguishable.
	#[error("key not found")]
	KeyNotFound,

	/// A concurrent rotation won the race and its key could not be re-read.
	#[error("rotation conflict")]
	RotationConflict,

	#[error("key store error: {0}")]
	Store(#[from] DbError),

	#[error("crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("rotation policy error: {0}")]
	Policy(String),

	#[error("internal error: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, KeyError>;

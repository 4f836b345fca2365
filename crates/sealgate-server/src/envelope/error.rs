// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope failures and the single response every one of them maps to.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use sealgate_crypto::CryptoError;
use serde::Serialize;

pub const DECRYPTION_FAILED_RC: &str = "GEN901";
pub const DECRYPTION_FAILED_CODE: &str = "DECRYPTION_FAILED";
pub const DECRYPTION_FAILED_TITLE: &str = "Decryption Failed";
pub const DECRYPTION_FAILED_DESCRIPTION: &str =
	"Unable to decrypt the payload. Possibly malformed or invalid key.";

/// Why an envelope could not be processed.
///
/// The variants exist for logs and metrics only. Every variant produces the
/// same client-visible response, see [`DecryptionFailedBody`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
	#[error("malformed envelope: {0}")]
	MalformedEnvelope(String),

	#[error("key not found")]
	KeyNotFound,

	#[error("key resolution failed: {0}")]
	KeyResolution(String),

	#[error("session key unwrap failed")]
	UnwrapFailure,

	#[error("payload authentication failed")]
	AuthenticationFailure,

	#[error("encoding error: {0}")]
	EncodingFailure(String),

	#[error("replay rejected: {0}")]
	Replay(&'static str),

	#[error("no session key for a protected response")]
	MissingSessionKey,

	#[error("response encryption failed: {0}")]
	ResponseEncryption(String),
}

impl EnvelopeError {
	/// Stable label used for the `reason` metric label and log fields.
	pub fn category(&self) -> &'static str {
		match self {
			EnvelopeError::MalformedEnvelope(_) => "malformed_envelope",
			EnvelopeError::KeyNotFound => "key_not_found",
			EnvelopeError::KeyResolution(_) => "key_resolution",
			EnvelopeError::UnwrapFailure => "unwrap_failure",
			EnvelopeError::AuthenticationFailure => "authentication_failure",
			EnvelopeError::EncodingFailure(_) => "encoding_failure",
			EnvelopeError::Replay(_) => "replay",
			EnvelopeError::MissingSessionKey => "missing_session_key",
			EnvelopeError::ResponseEncryption(_) => "response_encryption",
		}
	}

	/// Map a failure from unwrapping the `cek` field.
	pub(crate) fn from_unwrap(err: CryptoError) -> Self {
		match err {
			CryptoError::Encoding(msg) => EnvelopeError::EncodingFailure(msg),
			_ => EnvelopeError::UnwrapFailure,
		}
	}

	/// Map a failure from opening the `ct` field.
	pub(crate) fn from_open(err: CryptoError) -> Self {
		match err {
			CryptoError::Encoding(msg) => EnvelopeError::EncodingFailure(msg),
			CryptoError::InvalidNonceSize { expected, actual } => EnvelopeError::EncodingFailure(
				format!("iv must be {expected} bytes, got {actual}"),
			),
			_ => EnvelopeError::AuthenticationFailure,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
	pub message: &'static str,
	pub reason_code: &'static str,
}

/// The cleartext body sent for any envelope failure.
#[derive(Debug, Serialize)]
pub struct DecryptionFailedBody {
	pub success: bool,
	pub rc: &'static str,
	pub code: &'static str,
	pub title: &'static str,
	pub description: &'static str,
	pub errors: [ErrorDetail; 1],
}

impl Default for DecryptionFailedBody {
	fn default() -> Self {
		Self {
			success: false,
			rc: DECRYPTION_FAILED_RC,
			code: DECRYPTION_FAILED_CODE,
			title: DECRYPTION_FAILED_TITLE,
			description: DECRYPTION_FAILED_DESCRIPTION,
			errors: [ErrorDetail {
				message: DECRYPTION_FAILED_DESCRIPTION,
				reason_code: DECRYPTION_FAILED_CODE,
			}],
		}
	}
}

pub fn decryption_failed_response() -> Response {
	(StatusCode::BAD_REQUEST, Json(DecryptionFailedBody::default())).into_response()
}

impl IntoResponse for EnvelopeError {
	fn into_response(self) -> Response {
		decryption_failed_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::to_bytes;

	async fn body_of(err: EnvelopeError) -> (StatusCode, serde_json::Value) {
		let response = err.into_response();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	#[tokio::test]
	async fn every_variant_renders_the_same_response() {
		let variants = vec![
			EnvelopeError::MalformedEnvelope("missing field `kid`".into()),
			EnvelopeError::KeyNotFound,
			EnvelopeError::KeyResolution("database is locked".into()),
			EnvelopeError::UnwrapFailure,
			EnvelopeError::AuthenticationFailure,
			EnvelopeError::EncodingFailure("bad base64".into()),
			EnvelopeError::Replay("nonce reused"),
			EnvelopeError::MissingSessionKey,
			EnvelopeError::ResponseEncryption("boom".into()),
		];

		let (first_status, first_body) = body_of(EnvelopeError::KeyNotFound).await;
		for variant in variants {
			let (status, body) = body_of(variant).await;
			assert_eq!(status, first_status);
			assert_eq!(body, first_body);
		}
	}

	#[tokio::test]
	async fn generic_body_shape() {
		let (status, body) = body_of(EnvelopeError::UnwrapFailure).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(
			body,
			serde_json::json!({
				"success": false,
				"rc": "GEN901",
				"code": "DECRYPTION_FAILED",
				"title": "Decryption Failed",
				"description": "Unable to decrypt the payload. Possibly malformed or invalid key.",
				"errors": [{
					"message": "Unable to decrypt the payload. Possibly malformed or invalid key.",
					"reasonCode": "DECRYPTION_FAILED"
				}]
			})
		);
	}

	#[test]
	fn crypto_errors_map_to_coarse_categories() {
		assert_eq!(
			EnvelopeError::from_unwrap(CryptoError::Unwrap).category(),
			"unwrap_failure"
		);
		assert_eq!(
			EnvelopeError::from_open(CryptoError::Authentication).category(),
			"authentication_failure"
		);
		assert_eq!(
			EnvelopeError::from_open(CryptoError::InvalidNonceSize {
				expected: 12,
				actual: 16
			})
			.category(),
			"encoding_failure"
		);
	}
}

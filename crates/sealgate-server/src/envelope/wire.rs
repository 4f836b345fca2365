// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON wire format of request and response envelopes.
//!
//! Binary fields are base64url on the way out and leniently decoded on the
//! way in (see [`sealgate_crypto::encoding`]).

use sealgate_crypto::{aead, encoding, SessionKey, NONCE_SIZE};
use serde::{Deserialize, Serialize};

use super::error::EnvelopeError;

/// Body a client sends to a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
	/// Names the server key that wrapped `cek`.
	pub kid: String,
	/// Session key wrapped with RSA-OAEP-SHA-256.
	pub cek: String,
	pub iv: String,
	/// AES-256-GCM ciphertext with the tag appended.
	pub ct: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aad: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Client time in epoch milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ts: Option<i64>,
}

/// Binary fields of a [`RequestEnvelope`] after decoding.
pub struct DecodedRequest {
	pub cek: Vec<u8>,
	pub iv: [u8; NONCE_SIZE],
	pub ct: Vec<u8>,
	pub aad: Option<Vec<u8>>,
}

impl RequestEnvelope {
	pub fn from_slice(body: &[u8]) -> Result<Self, EnvelopeError> {
		let envelope: RequestEnvelope = serde_json::from_slice(body)
			.map_err(|e| EnvelopeError::MalformedEnvelope(e.to_string()))?;
		if envelope.kid.is_empty() {
			return Err(EnvelopeError::MalformedEnvelope("empty kid".to_string()));
		}
		Ok(envelope)
	}

	pub fn decode(&self) -> Result<DecodedRequest, EnvelopeError> {
		let field = |name: &str, value: &str| {
			encoding::decode(value).map_err(|e| EnvelopeError::EncodingFailure(format!("{name}: {e}")))
		};

		let iv = field("iv", &self.iv)?;
		let iv = <[u8; NONCE_SIZE]>::try_from(iv.as_slice()).map_err(|_| {
			EnvelopeError::EncodingFailure(format!("iv must be {NONCE_SIZE} bytes, got {}", iv.len()))
		})?;

		Ok(DecodedRequest {
			cek: field("cek", &self.cek)?,
			iv,
			ct: field("ct", &self.ct)?,
			aad: self.aad.as_deref().map(|aad| field("aad", aad)).transpose()?,
		})
	}
}

/// Body the server sends back from a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
	pub iv: String,
	pub ct: String,
}

impl ResponseEnvelope {
	/// Seal `plaintext` under the session key with a fresh nonce.
	pub fn seal(key: &SessionKey, plaintext: &[u8]) -> sealgate_crypto::Result<Self> {
		let sealed = aead::seal(key, plaintext, None)?;
		Ok(Self {
			iv: encoding::encode(sealed.nonce),
			ct: encoding::encode(&sealed.ciphertext),
		})
	}

	pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
		serde_json::to_vec(self).map_err(|e| EnvelopeError::ResponseEncryption(e.to_string()))
	}
}

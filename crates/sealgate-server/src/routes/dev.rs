// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Developer simulation routes. Only mounted when `envelope.dev_routes` is
//! set, which configuration validation forbids in production.
//!
//! They let a tester produce a valid request envelope and open a sealed
//! response without writing a client.

use axum::{extract::State, Json};
use sealgate_crypto::{aead, encoding, SessionKey};
use serde::{Deserialize, Serialize};

use crate::{
	api::AppState,
	envelope::{seal_request, seal_request_with_replay, RequestEnvelope},
	error::ServerError,
	routes::keys::{format_expires_at, PublicKeyResponse},
};

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
	/// Defaults to the active key.
	pub kid: Option<String>,
	pub plaintext: String,
	/// Raw associated data; encoded into the envelope as base64url.
	pub aad: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
	#[serde(flatten)]
	pub envelope: RequestEnvelope,
	/// Base64url session key for opening the response envelope.
	pub session_key: String,
}

#[derive(Debug, Deserialize)]
pub struct DecryptRequest {
	pub key: String,
	pub iv: String,
	pub ct: String,
	/// Base64, as carried in an envelope.
	pub aad: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecryptResponse {
	pub plaintext: String,
}

/// POST /v1/dev/encrypt
#[tracing::instrument(skip_all)]
pub async fn encrypt(
	State(state): State<AppState>,
	Json(req): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, ServerError> {
	let record = match &req.kid {
		Some(kid) => state.keys.resolve_by_kid(kid).await?,
		None => state.keys.get_active_key().await?,
	};

	let plaintext = req.plaintext.as_bytes();
	let aad = req.aad.as_deref().map(str::as_bytes);
	let sealed = if state.envelope.replay.is_some() {
		let nonce = encoding::encode(aead::generate_nonce());
		let ts = chrono::Utc::now().timestamp_millis();
		seal_request_with_replay(&record.kid, &record.public_key_pem, plaintext, aad, &nonce, ts)
	} else {
		seal_request(&record.kid, &record.public_key_pem, plaintext, aad)
	}
	.map_err(|e| ServerError::Internal(format!("sealing failed: {e}")))?;

	let envelope = sealed.envelope;
	Ok(Json(EncryptResponse {
		envelope,
		session_key: encoding::encode(sealed.session_key.expose()),
	}))
}

/// POST /v1/dev/decrypt
pub async fn decrypt(Json(req): Json<DecryptRequest>) -> Result<Json<DecryptResponse>, ServerError> {
	let bad = |field: &str| ServerError::BadRequest(format!("invalid {field}"));

	let key = encoding::decode(&req.key).map_err(|_| bad("key"))?;
	let key = SessionKey::from_slice(&key).map_err(|_| bad("key"))?;
	let iv = encoding::decode(&req.iv).map_err(|_| bad("iv"))?;
	let ct = encoding::decode(&req.ct).map_err(|_| bad("ct"))?;
	let aad = match &req.aad {
		Some(aad) => Some(encoding::decode(aad).map_err(|_| bad("aad"))?),
		None => None,
	};

	let plaintext = aead::open(&key, &iv, &ct, aad.as_deref())
		.map_err(|_| ServerError::BadRequest("decryption failed".to_string()))?;

	let plaintext = String::from_utf8(plaintext.to_vec())
		.map_err(|_| ServerError::BadRequest("plaintext is not UTF-8".to_string()))?;

	Ok(Json(DecryptResponse { plaintext }))
}

/// POST /v1/dev/rotate - force a new active key.
pub async fn rotate(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>, ServerError> {
	let record = state.keys.force_rotate().await?;
	tracing::info!(kid = %record.kid, "key rotated on demand");

	Ok(Json(PublicKeyResponse {
		kid: record.kid,
		public_key_pem: record.public_key_pem,
		expires_at: format_expires_at(record.expires_at),
	}))
}

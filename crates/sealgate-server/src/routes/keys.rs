// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Public key publication.

use axum::{
	extract::State,
	http::{header::CACHE_CONTROL, HeaderValue},
	response::{IntoResponse, Response},
	Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{api::AppState, error::ServerError};

/// `expiresAt` is rendered without a zone suffix and is always UTC.
pub const EXPIRES_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
	pub kid: String,
	pub public_key_pem: String,
	pub expires_at: String,
}

pub fn format_expires_at(ts: DateTime<Utc>) -> String {
	ts.format(EXPIRES_AT_FORMAT).to_string()
}

/// GET /v1/public/keys - the key clients should wrap session keys with.
///
/// Rotates first when no usable key exists.
#[tracing::instrument(skip(state))]
pub async fn get_public_key(State(state): State<AppState>) -> Result<Response, ServerError> {
	let record = state.keys.get_active_key().await?;

	let body = PublicKeyResponse {
		kid: record.kid,
		public_key_pem: record.public_key_pem,
		expires_at: format_expires_at(record.expires_at),
	};

	let cache_control = HeaderValue::from_str(&format!(
		"max-age={}",
		state.config.keys.public_key_max_age_secs
	))
	.map_err(|e| ServerError::Internal(e.to_string()))?;

	let mut response = Json(body).into_response();
	response.headers_mut().insert(CACHE_CONTROL, cache_control);
	Ok(response)
}

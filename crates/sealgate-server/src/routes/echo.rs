// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sample business route. Handlers only ever see and produce plaintext.

use axum::{body::Bytes, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// GET /v1/echo
pub async fn echo_get() -> impl IntoResponse {
	Json(json!({ "status": "ok" }))
}

/// POST /v1/echo - returns the decrypted JSON body wrapped in `{"echo": ...}`.
pub async fn echo_post(body: Bytes) -> impl IntoResponse {
	if body.is_empty() {
		return (StatusCode::OK, Json(json!({ "echo": null })));
	}

	match serde_json::from_slice::<Value>(&body) {
		Ok(value) => (StatusCode::OK, Json(json!({ "echo": value }))),
		Err(_) => (
			StatusCode::UNPROCESSABLE_ENTITY,
			Json(json!({ "error": "invalid_json", "message": "body is not valid JSON" })),
		),
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Errors for the non-envelope HTTP surface.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use sealgate_server_keys::KeyError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("key lifecycle error: {0}")]
	Keys(#[from] KeyError),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("metrics error: {0}")]
	Metrics(#[from] prometheus::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ServerError {
	fn status_and_kind(&self) -> (StatusCode, &'static str) {
		match self {
			ServerError::Keys(KeyError::KeyNotFound) => (StatusCode::NOT_FOUND, "key_not_found"),
			ServerError::Keys(_) => (StatusCode::SERVICE_UNAVAILABLE, "key_unavailable"),
			ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
			ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
			ServerError::Metrics(_) | ServerError::Internal(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
			}
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, kind) = self.status_and_kind();
		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		// Key store details stay in the log.
		let message = match &self {
			ServerError::BadRequest(m) | ServerError::NotFound(m) => m.clone(),
			ServerError::Keys(KeyError::KeyNotFound) => "key not found".to_string(),
			ServerError::Keys(_) => "signing key unavailable".to_string(),
			ServerError::Metrics(_) | ServerError::Internal(_) => "internal server error".to_string(),
		};

		(
			status,
			Json(ErrorResponse {
				error: kind.to_string(),
				message,
			}),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::to_bytes;

	async fn body_json(response: Response) -> serde_json::Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn store_failures_are_unavailable_without_details() {
		let err = ServerError::Keys(KeyError::Internal("disk on fire".to_string()));
		let response = err.into_response();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		let json = body_json(response).await;
		assert_eq!(json["error"], "key_unavailable");
		assert!(!json["message"].as_str().unwrap().contains("disk"));
	}

	#[tokio::test]
	async fn bad_request_keeps_message() {
		let response = ServerError::BadRequest("plaintext is required".to_string()).into_response();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let json = body_json(response).await;
		assert_eq!(json["error"], "bad_request");
		assert_eq!(json["message"], "plaintext is required");
	}

	#[test]
	fn unknown_kid_maps_to_not_found() {
		let response = ServerError::from(KeyError::KeyNotFound).into_response();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Axum middleware that opens request envelopes and seals responses.
//!
//! ```ignore
//! use axum::middleware::from_fn_with_state;
//!
//! let app = Router::new()
//!     .route("/v1/echo", post(echo))
//!     .layer(from_fn_with_state(envelope_state, envelope_layer));
//! ```

use std::sync::Arc;

use axum::{
	body::{to_bytes, Body},
	extract::State,
	http::{
		header::{CONTENT_LENGTH, CONTENT_TYPE},
		HeaderMap, HeaderValue, Request,
	},
	middleware::Next,
	response::{IntoResponse, Response},
};
use sealgate_crypto::{aead, wrap};
use sealgate_server_config::MissingKeyPolicy;
use sealgate_server_keys::{KeyError, KeyLifecycleManager};
use tracing::{error, instrument, warn, Span};

use super::context::SessionKeyContext;
use super::error::EnvelopeError;
use super::exempt::ExemptionMatcher;
use super::replay::{bind_replay_fields, ReplayGuard};
use super::wire::{RequestEnvelope, ResponseEnvelope};
use crate::metrics::{Metrics, STAGE_DECRYPT, STAGE_ENCRYPT};

/// Everything the envelope middleware needs, shared by all requests.
#[derive(Clone)]
pub struct EnvelopeState {
	pub keys: Arc<KeyLifecycleManager>,
	pub exemptions: Arc<ExemptionMatcher>,
	pub missing_key_policy: MissingKeyPolicy,
	pub max_body_bytes: usize,
	pub replay: Option<Arc<ReplayGuard>>,
	pub metrics: Arc<Metrics>,
}

/// Decrypt the request body before the handler runs and encrypt the
/// response body after it returns.
///
/// Any failure before the handler produces the generic decryption failure
/// and the handler is never called.
#[instrument(
	name = "envelope",
	skip_all,
	fields(path = %request.uri().path(), kid = tracing::field::Empty)
)]
pub async fn envelope_layer(
	State(state): State<EnvelopeState>,
	request: Request<Body>,
	next: Next,
) -> Response {
	if state.exemptions.is_exempt(request.uri().path()) {
		state.metrics.record_bypass();
		return next.run(request).await;
	}

	let mut session = SessionKeyContext::new();

	let request = match open_request(&state, request, &mut session).await {
		Ok(request) => request,
		Err(err) => return reject(&state, STAGE_DECRYPT, err),
	};

	let response = next.run(request).await;

	let sealed = seal_response(&state, response, &session).await;
	session.clear();

	match sealed {
		Ok(response) => response,
		Err(err) => reject(&state, STAGE_ENCRYPT, err),
	}
}

async fn open_request(
	state: &EnvelopeState,
	request: Request<Body>,
	session: &mut SessionKeyContext,
) -> Result<Request<Body>, EnvelopeError> {
	let (mut parts, body) = request.into_parts();
	let bytes = to_bytes(body, state.max_body_bytes)
		.await
		.map_err(|e| EnvelopeError::MalformedEnvelope(format!("unreadable body: {e}")))?;

	if bytes.iter().all(u8::is_ascii_whitespace) {
		state.metrics.record_outcome(STAGE_DECRYPT, "empty");
		set_content_length(&mut parts.headers, 0);
		return Ok(Request::from_parts(parts, Body::empty()));
	}

	let envelope = RequestEnvelope::from_slice(&bytes)?;
	Span::current().record("kid", envelope.kid.as_str());

	if let Some(guard) = &state.replay {
		guard.check_fresh(envelope.nonce.as_deref(), envelope.ts)?;
	}

	let decoded = envelope.decode()?;

	let resolved = state
		.keys
		.resolve_private_key(&envelope.kid)
		.await
		.map_err(|e| match e {
			KeyError::KeyNotFound => EnvelopeError::KeyNotFound,
			other => EnvelopeError::KeyResolution(other.to_string()),
		})?;

	let session_key = wrap::unwrap_session_key(resolved.private_key(), &decoded.cek)
		.map_err(EnvelopeError::from_unwrap)?;

	let replay_fields = match (&state.replay, &envelope.nonce, envelope.ts) {
		(Some(guard), Some(nonce), Some(ts)) => Some((guard, nonce.as_str(), ts)),
		_ => None,
	};

	let bound_aad = replay_fields
		.map(|(_, nonce, ts)| bind_replay_fields(decoded.aad.as_deref(), nonce, ts));
	let aad = bound_aad.as_deref().or(decoded.aad.as_deref());

	let plaintext = aead::open(&session_key, &decoded.iv, &decoded.ct, aad)
		.map_err(EnvelopeError::from_open)?;

	if let Some((guard, nonce, ts)) = replay_fields {
		guard.record(&envelope.kid, nonce, ts)?;
	}

	session.set(session_key);
	state.metrics.record_outcome(STAGE_DECRYPT, "ok");

	set_content_length(&mut parts.headers, plaintext.len());
	Ok(Request::from_parts(parts, Body::from(plaintext.to_vec())))
}

async fn seal_response(
	state: &EnvelopeState,
	response: Response,
	session: &SessionKeyContext,
) -> Result<Response, EnvelopeError> {
	let Some(session_key) = session.get() else {
		return match state.missing_key_policy {
			MissingKeyPolicy::Reject => Err(EnvelopeError::MissingSessionKey),
			MissingKeyPolicy::Passthrough => {
				warn!("no session key for protected route, sending response in cleartext");
				state.metrics.record_outcome(STAGE_ENCRYPT, "passthrough");
				Ok(response)
			}
		};
	};

	let (mut parts, body) = response.into_parts();
	let bytes = to_bytes(body, usize::MAX)
		.await
		.map_err(|e| EnvelopeError::ResponseEncryption(format!("unreadable response body: {e}")))?;

	if bytes.is_empty() {
		state.metrics.record_outcome(STAGE_ENCRYPT, "empty");
		return Ok(Response::from_parts(parts, Body::empty()));
	}

	let sealed = ResponseEnvelope::seal(session_key, &bytes)
		.map_err(|e| EnvelopeError::ResponseEncryption(e.to_string()))?
		.to_vec()?;

	parts
		.headers
		.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	set_content_length(&mut parts.headers, sealed.len());
	state.metrics.record_outcome(STAGE_ENCRYPT, "ok");

	Ok(Response::from_parts(parts, Body::from(sealed)))
}

fn reject(state: &EnvelopeState, stage: &'static str, err: EnvelopeError) -> Response {
	match &err {
		EnvelopeError::KeyResolution(_) | EnvelopeError::ResponseEncryption(_) => {
			error!(stage, reason = err.category(), error = %err, "envelope processing failed");
		}
		_ => {
			warn!(stage, reason = err.category(), error = %err, "envelope rejected");
		}
	}
	state.metrics.record_failure(stage, &err);
	err.into_response()
}

fn set_content_length(headers: &mut HeaderMap, len: usize) {
	if len == 0 {
		headers.remove(CONTENT_LENGTH);
	} else {
		headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
	}
}

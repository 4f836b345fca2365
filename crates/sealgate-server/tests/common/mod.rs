// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::{
	body::{to_bytes, Body},
	http::{Request, StatusCode},
	response::Response,
	Router,
};
use sealgate_crypto::{generate_keypair, KeyPair, SessionKey, MIN_RSA_BITS};
use sealgate_server::{
	create_app_state, create_key_manager, create_router,
	envelope::{
		open_response, seal_request, seal_request_with_replay, RequestEnvelope, ResponseEnvelope,
	},
	AppState,
};
use sealgate_server_config::ServerConfig;
use sealgate_server_db::InMemoryKeyStore;
use sealgate_server_keys::StaticKeyGenerator;
use serde_json::Value;
use tower::ServiceExt;

/// Generating RSA keys is slow, so every test in a binary shares one.
pub fn test_keypair() -> KeyPair {
	static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
	KEYPAIR
		.get_or_init(|| generate_keypair(MIN_RSA_BITS).unwrap())
		.clone()
}

pub fn test_config() -> ServerConfig {
	ServerConfig::default()
}

pub fn setup_state(config: ServerConfig) -> AppState {
	let generator = Arc::new(StaticKeyGenerator::new(test_keypair()));
	let keys = create_key_manager(&config, Arc::new(InMemoryKeyStore::new()), generator).unwrap();
	create_app_state(config, Arc::new(keys)).unwrap()
}

pub fn setup_test_app(config: ServerConfig) -> (Router, AppState) {
	let state = setup_state(config);
	(create_router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
	app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
	to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap()
		.to_vec()
}

pub async fn body_json(response: Response) -> Value {
	serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A published key as returned by `GET /v1/public/keys`.
pub struct PublishedKey {
	pub kid: String,
	pub public_key_pem: String,
}

pub async fn fetch_public_key(app: &Router) -> PublishedKey {
	let response = send(
		app,
		Request::builder()
			.uri("/v1/public/keys")
			.body(Body::empty())
			.unwrap(),
	)
	.await;
	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;
	PublishedKey {
		kid: json["kid"].as_str().unwrap().to_string(),
		public_key_pem: json["publicKeyPem"].as_str().unwrap().to_string(),
	}
}

pub fn seal(key: &PublishedKey, plaintext: &[u8]) -> (RequestEnvelope, SessionKey) {
	let sealed = seal_request(&key.kid, &key.public_key_pem, plaintext, None).unwrap();
	(sealed.envelope, sealed.session_key)
}

/// Seal with replay fields bound into the associated data.
pub fn seal_with_replay(
	key: &PublishedKey,
	plaintext: &[u8],
	nonce: &str,
	ts: i64,
) -> (RequestEnvelope, SessionKey) {
	let sealed =
		seal_request_with_replay(&key.kid, &key.public_key_pem, plaintext, None, nonce, ts).unwrap();
	(sealed.envelope, sealed.session_key)
}

pub fn now_ms() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

pub fn envelope_post(uri: &str, envelope: &RequestEnvelope) -> Request<Body> {
	raw_post(uri, serde_json::to_vec(envelope).unwrap())
}

pub fn raw_post(uri: &str, body: impl Into<Body>) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(body.into())
		.unwrap()
}

/// Parse a sealed response body and open it.
pub async fn open_sealed(response: Response, session_key: &SessionKey) -> (ResponseEnvelope, Vec<u8>) {
	let envelope: ResponseEnvelope = serde_json::from_slice(&body_bytes(response).await).unwrap();
	let plaintext = open_response(session_key, &envelope).unwrap();
	(envelope, plaintext)
}

/// Assert the response is the single generic decryption failure.
pub async fn assert_decryption_failed(response: Response) {
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert_eq!(json["success"], false);
	assert_eq!(json["rc"], "GEN901");
	assert_eq!(json["code"], "DECRYPTION_FAILED");
	assert_eq!(json["errors"][0]["reasonCode"], "DECRYPTION_FAILED");
}

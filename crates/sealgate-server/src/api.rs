// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;

use axum::{
	middleware::from_fn_with_state,
	routing::{get, post},
	Router,
};
use sealgate_server_config::ServerConfig;
use sealgate_server_db::KeyStore;
use sealgate_server_jobs::JobScheduler;
use sealgate_server_keys::{KeyGenerator, KeyLifecycleManager, RotationPolicy};

use crate::{
	envelope::{envelope_layer, EnvelopeState, ExemptionMatcher, ReplayGuard},
	error::ServerError,
	metrics::Metrics,
	routes,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<ServerConfig>,
	pub keys: Arc<KeyLifecycleManager>,
	pub envelope: EnvelopeState,
	pub metrics: Arc<Metrics>,
	pub job_scheduler: Option<Arc<JobScheduler>>,
}

/// Build a key lifecycle manager from the `keys` section of `config`.
pub fn create_key_manager(
	config: &ServerConfig,
	store: Arc<dyn KeyStore>,
	generator: Arc<dyn KeyGenerator>,
) -> Result<KeyLifecycleManager, ServerError> {
	let policy = RotationPolicy::from_expression(&config.keys.rotation_schedule)?;
	let buffer_secs = i64::try_from(config.keys.expiry_buffer_secs)
		.map_err(|_| ServerError::Internal("expiry buffer out of range".to_string()))?;

	Ok(KeyLifecycleManager::new(store, generator)
		.with_policy(policy)
		.with_expiry_buffer(chrono::Duration::seconds(buffer_secs)))
}

/// Create the application state. The job scheduler is attached by the
/// binary once its jobs are registered.
pub fn create_app_state(
	config: ServerConfig,
	keys: Arc<KeyLifecycleManager>,
) -> Result<AppState, ServerError> {
	let metrics = Arc::new(Metrics::new()?);

	let exemptions = ExemptionMatcher::new(
		&config.envelope.context_path,
		config.envelope.exempt_paths.iter().cloned(),
	)
	.map_err(|e| ServerError::Internal(format!("invalid exempt path pattern: {e}")))?;

	let replay = config
		.replay
		.enabled
		.then(|| Arc::new(ReplayGuard::new(config.replay.window(), config.replay.max_entries)));

	let envelope = EnvelopeState {
		keys: Arc::clone(&keys),
		exemptions: Arc::new(exemptions),
		missing_key_policy: config.envelope.missing_key_policy,
		max_body_bytes: config.envelope.max_body_bytes,
		replay,
		metrics: Arc::clone(&metrics),
	};

	Ok(AppState {
		config: Arc::new(config),
		keys,
		envelope,
		metrics,
		job_scheduler: None,
	})
}

/// Create the router with every route behind the envelope middleware.
/// Exempt routes are let through by the middleware itself.
pub fn create_router(state: AppState) -> Router {
	let mut api = Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/metrics", get(routes::metrics::prometheus_metrics))
		.route("/v1/public/keys", get(routes::keys::get_public_key))
		.route(
			"/v1/echo",
			get(routes::echo::echo_get).post(routes::echo::echo_post),
		);

	if state.config.envelope.dev_routes {
		tracing::warn!("developer simulation routes are enabled");
		api = api
			.route("/v1/dev/encrypt", post(routes::dev::encrypt))
			.route("/v1/dev/decrypt", post(routes::dev::decrypt))
			.route("/v1/dev/rotate", post(routes::dev::rotate));
	}

	let context_path = state.config.envelope.context_path.clone();
	let envelope = state.envelope.clone();
	let api = api.with_state(state);

	let router = if context_path.is_empty() {
		api
	} else {
		Router::new().nest(&context_path, api)
	};

	router.layer(from_fn_with_state(envelope, envelope_layer))
}

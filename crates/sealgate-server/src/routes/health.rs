// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health handler.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use sealgate_server_jobs::{HealthState, JobsHealthStatus, JobScheduler};
use sealgate_server_keys::KeyLifecycleManager;
use serde::Serialize;

use crate::{api::AppState, routes::keys::format_expires_at};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthState,
	pub timestamp: String,
	pub keys: KeysHealth,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub jobs: Option<JobsHealthStatus>,
}

#[derive(Debug, Serialize)]
pub struct KeysHealth {
	pub status: HealthState,
	pub active_kid: Option<String>,
	pub expires_at: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Checks the active key without rotating. A missing key is degraded: the
/// next caller of the public key endpoint creates one.
pub async fn check_keys(keys: &KeyLifecycleManager) -> KeysHealth {
	match keys.peek_active_key().await {
		Ok(Some(record)) => KeysHealth {
			status: HealthState::Healthy,
			active_kid: Some(record.kid),
			expires_at: Some(format_expires_at(record.expires_at)),
			error: None,
		},
		Ok(None) => KeysHealth {
			status: HealthState::Degraded,
			active_kid: None,
			expires_at: None,
			error: None,
		},
		Err(e) => {
			tracing::warn!(error = %e, "health: key store check failed");
			KeysHealth {
				status: HealthState::Unhealthy,
				active_kid: None,
				expires_at: None,
				error: Some("key store unavailable".to_string()),
			}
		}
	}
}

pub async fn check_jobs(scheduler: Option<&Arc<JobScheduler>>) -> Option<JobsHealthStatus> {
	Some(scheduler?.health_status().await)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let (keys, jobs) = tokio::join!(
		check_keys(&state.keys),
		check_jobs(state.job_scheduler.as_ref())
	);

	let status = match &jobs {
		Some(jobs) => keys.status.max(jobs.status),
		None => keys.status,
	};

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		keys,
		jobs,
	};

	let http_status = match status {
		HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
		HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(http_status, Json(response))
}

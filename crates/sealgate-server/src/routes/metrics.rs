// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{
	extract::State,
	http::{header::CONTENT_TYPE, StatusCode},
	response::IntoResponse,
};

use crate::{api::AppState, error::ServerError};

/// GET /metrics - Prometheus text exposition.
pub async fn prometheus_metrics(
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
	state.metrics.set_key_rotations(state.keys.rotation_count());

	match state.metrics.gather() {
		Ok(metrics) => {
			tracing::debug!("prometheus_metrics: gathering metrics");
			Ok((
				StatusCode::OK,
				[(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
				metrics,
			))
		}
		Err(e) => {
			tracing::error!(error = %e, "prometheus_metrics: failed to gather metrics");
			Err(ServerError::Internal(format!("Failed to gather metrics: {e}")))
		}
	}
}

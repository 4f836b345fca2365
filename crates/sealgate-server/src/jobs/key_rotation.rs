// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use sealgate_server_jobs::{Job, JobContext, JobError, JobOutput};
use sealgate_server_keys::{KeyError, KeyLifecycleManager};
use tracing::instrument;

pub const KEY_ROTATION_JOB_ID: &str = "key-rotation";

/// Makes sure a usable key exists. Registered on the rotation schedule and
/// run once at startup.
pub struct KeyRotationJob {
	keys: Arc<KeyLifecycleManager>,
}

impl KeyRotationJob {
	pub fn new(keys: Arc<KeyLifecycleManager>) -> Self {
		Self { keys }
	}
}

#[async_trait]
impl Job for KeyRotationJob {
	fn id(&self) -> &str {
		KEY_ROTATION_JOB_ID
	}

	fn name(&self) -> &str {
		"Key Rotation"
	}

	fn description(&self) -> &str {
		"Create a new RSA keypair when no key outlives the expiry buffer"
	}

	#[instrument(skip(self, ctx), fields(job_id = KEY_ROTATION_JOB_ID))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let rotations_before = self.keys.rotation_count();

		let record = self.keys.rotate_if_needed().await.map_err(|e| match e {
			KeyError::Policy(message) => JobError::fatal(message),
			other => JobError::retryable(other.to_string()),
		})?;

		let rotated = self.keys.rotation_count() > rotations_before;

		tracing::info!(
			kid = %record.kid,
			expires_at = %record.expires_at,
			rotated,
			"key rotation check complete"
		);

		Ok(JobOutput {
			message: if rotated {
				format!("Rotated to key {}", record.kid)
			} else {
				format!("Key {} still active", record.kid)
			},
			metadata: Some(serde_json::json!({
				"kid": record.kid,
				"expires_at": record.expires_at.to_rfc3339(),
				"rotated": rotated,
			})),
		})
	}
}

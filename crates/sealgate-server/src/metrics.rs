// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prometheus metrics for the envelope pipeline and key lifecycle.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::envelope::EnvelopeError;

pub const STAGE_BYPASS: &str = "bypass";
pub const STAGE_DECRYPT: &str = "decrypt";
pub const STAGE_ENCRYPT: &str = "encrypt";

pub struct Metrics {
	registry: Registry,

	/// Labels: stage (bypass, decrypt, encrypt), outcome.
	envelope_requests: IntCounterVec,
	key_resolution_misses: IntCounter,
	key_rotations: IntGauge,
}

impl Metrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let envelope_requests = IntCounterVec::new(
			Opts::new(
				"sealgate_envelope_requests_total",
				"Requests seen by the envelope pipeline by stage and outcome",
			),
			&["stage", "outcome"],
		)?;
		registry.register(Box::new(envelope_requests.clone()))?;

		let key_resolution_misses = IntCounter::new(
			"sealgate_key_resolution_misses_total",
			"Envelopes naming an unknown or expired kid",
		)?;
		registry.register(Box::new(key_resolution_misses.clone()))?;

		let key_rotations = IntGauge::new(
			"sealgate_key_rotations",
			"Keys created by this process since start",
		)?;
		registry.register(Box::new(key_rotations.clone()))?;

		Ok(Self {
			registry,
			envelope_requests,
			key_resolution_misses,
			key_rotations,
		})
	}

	pub fn record_bypass(&self) {
		self.envelope_requests
			.with_label_values(&[STAGE_BYPASS, "exempt"])
			.inc();
	}

	pub fn record_outcome(&self, stage: &str, outcome: &str) {
		self.envelope_requests
			.with_label_values(&[stage, outcome])
			.inc();
	}

	pub fn record_failure(&self, stage: &str, err: &EnvelopeError) {
		if matches!(err, EnvelopeError::KeyNotFound) {
			self.key_resolution_misses.inc();
		}
		self.record_outcome(stage, err.category());
	}

	pub fn set_key_rotations(&self, rotations: u64) {
		self.key_rotations
			.set(i64::try_from(rotations).unwrap_or(i64::MAX));
	}

	/// Render all metrics in the Prometheus text format.
	pub fn gather(&self) -> Result<String, prometheus::Error> {
		let mut buffer = Vec::new();
		TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
		String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_outcomes_by_stage() {
		let metrics = Metrics::new().unwrap();
		metrics.record_bypass();
		metrics.record_outcome(STAGE_DECRYPT, "ok");
		metrics.record_failure(STAGE_DECRYPT, &EnvelopeError::KeyNotFound);
		metrics.set_key_rotations(2);

		let text = metrics.gather().unwrap();
		assert!(text.contains(r#"sealgate_envelope_requests_total{outcome="exempt",stage="bypass"} 1"#));
		assert!(text.contains(r#"sealgate_envelope_requests_total{outcome="ok",stage="decrypt"} 1"#));
		assert!(text.contains(r#"sealgate_envelope_requests_total{outcome="key_not_found",stage="decrypt"} 1"#));
		assert!(text.contains("sealgate_key_resolution_misses_total 1"));
		assert!(text.contains("sealgate_key_rotations 2"));
	}
}

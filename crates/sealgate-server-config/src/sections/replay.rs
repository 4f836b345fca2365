// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use serde::Deserialize;

/// Anti-replay enforcement on the envelope `nonce`/`ts` fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
	pub enabled: bool,
	pub window_secs: u64,
	pub max_entries: usize,
}

impl ReplayConfig {
	pub fn window(&self) -> Duration {
		Duration::from_secs(self.window_secs)
	}
}

impl Default for ReplayConfig {
	fn default() -> Self {
		ReplayConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReplayConfigLayer {
	pub enabled: Option<bool>,
	pub window_secs: Option<u64>,
	pub max_entries: Option<usize>,
}

impl ReplayConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.window_secs.is_some() {
			self.window_secs = other.window_secs;
		}
		if other.max_entries.is_some() {
			self.max_entries = other.max_entries;
		}
	}

	pub fn finalize(self) -> ReplayConfig {
		ReplayConfig {
			enabled: self.enabled.unwrap_or(false),
			window_secs: self.window_secs.unwrap_or(300),
			max_entries: self.max_entries.unwrap_or(100_000),
		}
	}
}

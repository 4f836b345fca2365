// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs configuration section.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	pub rotation_enabled: Option<bool>,
	pub retry_max: Option<u32>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.rotation_enabled.is_some() {
			self.rotation_enabled = other.rotation_enabled;
		}
		if other.retry_max.is_some() {
			self.retry_max = other.retry_max;
		}
	}

	pub fn finalize(self) -> JobsConfig {
		JobsConfig {
			rotation_enabled: self.rotation_enabled.unwrap_or(true),
			retry_max: self.retry_max.unwrap_or(3),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobsConfig {
	/// Schedule the key rotation job. Rotation on first use happens regardless.
	pub rotation_enabled: bool,
	pub retry_max: u32,
}

impl Default for JobsConfig {
	fn default() -> Self {
		JobsConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = JobsConfig::default();
		assert!(config.rotation_enabled);
		assert_eq!(config.retry_max, 3);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = JobsConfigLayer {
			rotation_enabled: Some(true),
			retry_max: Some(5),
		};
		base.merge(JobsConfigLayer {
			rotation_enabled: Some(false),
			retry_max: None,
		});
		assert_eq!(base.rotation_enabled, Some(false));
		assert_eq!(base.retry_max, Some(5));
	}
}

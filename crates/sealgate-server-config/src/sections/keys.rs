// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Asymmetric key lifecycle configuration.

use std::time::Duration;

use serde::Deserialize;

/// Smallest RSA modulus accepted for generated keys.
pub const MIN_RSA_BITS: usize = 2048;

const DEFAULT_EXPIRY_BUFFER_SECS: u64 = 300;
const DEFAULT_ROTATION_SCHEDULE: &str = "0 0 0 1 * *";
const DEFAULT_PUBLIC_KEY_MAX_AGE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct KeysConfig {
	pub expiry_buffer_secs: u64,
	/// Cron expression (UTC). Its next occurrence is the expiry of a new key.
	pub rotation_schedule: String,
	pub rsa_bits: usize,
	/// `Cache-Control` max-age of the public key endpoint.
	pub public_key_max_age_secs: u64,
}

impl KeysConfig {
	pub fn expiry_buffer(&self) -> Duration {
		Duration::from_secs(self.expiry_buffer_secs)
	}
}

impl Default for KeysConfig {
	fn default() -> Self {
		KeysConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeysConfigLayer {
	pub expiry_buffer_secs: Option<u64>,
	pub rotation_schedule: Option<String>,
	pub rsa_bits: Option<usize>,
	pub public_key_max_age_secs: Option<u64>,
}

impl KeysConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.expiry_buffer_secs.is_some() {
			self.expiry_buffer_secs = other.expiry_buffer_secs;
		}
		if other.rotation_schedule.is_some() {
			self.rotation_schedule = other.rotation_schedule;
		}
		if other.rsa_bits.is_some() {
			self.rsa_bits = other.rsa_bits;
		}
		if other.public_key_max_age_secs.is_some() {
			self.public_key_max_age_secs = other.public_key_max_age_secs;
		}
	}

	pub fn finalize(self) -> KeysConfig {
		KeysConfig {
			expiry_buffer_secs: self.expiry_buffer_secs.unwrap_or(DEFAULT_EXPIRY_BUFFER_SECS),
			rotation_schedule: self
				.rotation_schedule
				.unwrap_or_else(|| DEFAULT_ROTATION_SCHEDULE.to_string()),
			rsa_bits: self.rsa_bits.unwrap_or(MIN_RSA_BITS),
			public_key_max_age_secs: self
				.public_key_max_age_secs
				.unwrap_or(DEFAULT_PUBLIC_KEY_MAX_AGE_SECS),
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope middleware configuration.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// What the response stage does when no session key was negotiated for a
/// non-exempt request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
	/// Replace the response with the generic decryption failure.
	#[default]
	Reject,
	/// Send the handler's response in cleartext and log a warning.
	Passthrough,
}

impl FromStr for MissingKeyPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"reject" => Ok(MissingKeyPolicy::Reject),
			"passthrough" => Ok(MissingKeyPolicy::Passthrough),
			other => Err(format!(
				"unknown missing key policy '{other}', expected reject or passthrough"
			)),
		}
	}
}

impl fmt::Display for MissingKeyPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MissingKeyPolicy::Reject => f.write_str("reject"),
			MissingKeyPolicy::Passthrough => f.write_str("passthrough"),
		}
	}
}

pub fn default_exempt_paths() -> Vec<String> {
	[
		"/v1/public/**",
		"/v1/dev/**",
		"/actuator/**",
		"/swagger-ui/**",
		"/v3/api-docs/**",
		"/health",
		"/metrics",
	]
	.into_iter()
	.map(str::to_string)
	.collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeConfig {
	/// Mount prefix removed from the request path before exemption matching.
	pub context_path: String,
	pub exempt_paths: Vec<String>,
	pub missing_key_policy: MissingKeyPolicy,
	pub max_body_bytes: usize,
	pub dev_routes: bool,
}

impl Default for EnvelopeConfig {
	fn default() -> Self {
		EnvelopeConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EnvelopeConfigLayer {
	pub context_path: Option<String>,
	pub exempt_paths: Option<Vec<String>>,
	pub missing_key_policy: Option<MissingKeyPolicy>,
	pub max_body_bytes: Option<usize>,
	pub dev_routes: Option<bool>,
}

impl EnvelopeConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.context_path.is_some() {
			self.context_path = other.context_path;
		}
		if other.exempt_paths.is_some() {
			self.exempt_paths = other.exempt_paths;
		}
		if other.missing_key_policy.is_some() {
			self.missing_key_policy = other.missing_key_policy;
		}
		if other.max_body_bytes.is_some() {
			self.max_body_bytes = other.max_body_bytes;
		}
		if other.dev_routes.is_some() {
			self.dev_routes = other.dev_routes;
		}
	}

	pub fn finalize(self) -> EnvelopeConfig {
		EnvelopeConfig {
			context_path: normalize_context_path(self.context_path.unwrap_or_default()),
			exempt_paths: self.exempt_paths.unwrap_or_else(default_exempt_paths),
			missing_key_policy: self.missing_key_policy.unwrap_or_default(),
			max_body_bytes: self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
			dev_routes: self.dev_routes.unwrap_or(false),
		}
	}
}

/// `"api/"` and `"/api"` both become `"/api"`; `"/"` becomes empty.
fn normalize_context_path(path: String) -> String {
	let trimmed = path.trim().trim_matches('/');
	if trimmed.is_empty() {
		String::new()
	} else {
		format!("/{trimmed}")
	}
}

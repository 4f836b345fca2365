// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Deployment environment. Production forbids the developer routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	#[default]
	Development,
	Production,
}

impl Environment {
	pub fn is_production(&self) -> bool {
		matches!(self, Environment::Production)
	}
}

impl FromStr for Environment {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"development" | "dev" => Ok(Environment::Development),
			"production" | "prod" => Ok(Environment::Production),
			other => Err(format!(
				"unknown environment '{other}', expected development or production"
			)),
		}
	}
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Environment::Development => f.write_str("development"),
			Environment::Production => f.write_str("production"),
		}
	}
}

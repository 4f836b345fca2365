// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key store database configuration.

use serde::Deserialize;

/// Selects the in-process key store instead of SQLite.
pub const MEMORY_DATABASE_URL: &str = "memory";

const DEFAULT_URL: &str = "sqlite:./sealgate.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl DatabaseConfig {
	pub fn is_memory(&self) -> bool {
		self.url == MEMORY_DATABASE_URL
	}

	/// The connection URL with any embedded credentials hidden, for logs.
	pub fn redacted_url(&self) -> String {
		match (self.url.find("://"), self.url.rfind('@')) {
			(Some(scheme_end), Some(at)) if at > scheme_end => {
				format!("{}://[REDACTED]{}", &self.url[..scheme_end], &self.url[at..])
			}
			_ => self.url.clone(),
		}
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
		}
	}
}

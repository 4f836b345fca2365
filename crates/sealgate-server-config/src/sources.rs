// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, EnvelopeConfigLayer, HttpConfigLayer, JobsConfigLayer, KeysConfigLayer,
	LoggingConfigLayer, ReplayConfigLayer,
};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "SEALGATE_CONFIG_PATH";

const SYSTEM_CONFIG_PATH: &str = "/etc/sealgate/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source. Defaults are applied by each section's
/// `finalize`, so this contributes an empty layer.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$SEALGATE_CONFIG_PATH`, falling back to `/etc/sealgate/server.toml`.
	pub fn system() -> Self {
		let path = std::env::var(CONFIG_PATH_ENV)
			.ok()
			.filter(|p| !p.is_empty())
			.unwrap_or_else(|| SYSTEM_CONFIG_PATH.to_string());
		Self::new(path)
	}

	pub fn path(&self) -> &PathBuf {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `SEALGATE_SERVER_<SECTION>_<FIELD>`, except the http fields
/// which drop the section name.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_lookup(&|name| std::env::var(name).ok())
	}
}

type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

/// Builds a layer from an arbitrary variable lookup.
pub(crate) fn load_from_lookup(lookup: &Lookup<'_>) -> Result<ServerConfigLayer, ConfigError> {
	let env = Env { lookup };
	Ok(ServerConfigLayer {
		environment: env.parse("SEALGATE_SERVER_ENV")?,
		http: Some(HttpConfigLayer {
			host: env.var("SEALGATE_SERVER_HOST"),
			port: env.parse("SEALGATE_SERVER_PORT")?,
			base_url: env.var("SEALGATE_SERVER_BASE_URL"),
		}),
		database: Some(DatabaseConfigLayer {
			url: env.var("SEALGATE_SERVER_DATABASE_URL"),
			max_connections: env.parse("SEALGATE_SERVER_DATABASE_MAX_CONNECTIONS")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: env.var("SEALGATE_SERVER_LOG_LEVEL"),
			format: env.parse("SEALGATE_SERVER_LOG_FORMAT")?,
		}),
		keys: Some(KeysConfigLayer {
			expiry_buffer_secs: env.parse("SEALGATE_SERVER_KEYS_EXPIRY_BUFFER_SECS")?,
			rotation_schedule: env.var("SEALGATE_SERVER_KEYS_ROTATION_SCHEDULE"),
			rsa_bits: env.parse("SEALGATE_SERVER_KEYS_RSA_BITS")?,
			public_key_max_age_secs: env.parse("SEALGATE_SERVER_KEYS_PUBLIC_KEY_MAX_AGE_SECS")?,
		}),
		envelope: Some(EnvelopeConfigLayer {
			context_path: env.var("SEALGATE_SERVER_ENVELOPE_CONTEXT_PATH"),
			exempt_paths: env.list("SEALGATE_SERVER_ENVELOPE_EXEMPT_PATHS"),
			missing_key_policy: env.parse("SEALGATE_SERVER_ENVELOPE_MISSING_KEY_POLICY")?,
			max_body_bytes: env.parse("SEALGATE_SERVER_ENVELOPE_MAX_BODY_BYTES")?,
			dev_routes: env.bool("SEALGATE_SERVER_ENVELOPE_DEV_ROUTES"),
		}),
		replay: Some(ReplayConfigLayer {
			enabled: env.bool("SEALGATE_SERVER_REPLAY_ENABLED"),
			window_secs: env.parse("SEALGATE_SERVER_REPLAY_WINDOW_SECS")?,
			max_entries: env.parse("SEALGATE_SERVER_REPLAY_MAX_ENTRIES")?,
		}),
		jobs: Some(JobsConfigLayer {
			rotation_enabled: env.bool("SEALGATE_SERVER_JOBS_ROTATION_ENABLED"),
			retry_max: env.parse("SEALGATE_SERVER_JOBS_RETRY_MAX")?,
		}),
	})
}

struct Env<'a> {
	lookup: &'a Lookup<'a>,
}

impl Env<'_> {
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}

	fn parse<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
		T::Err: Display,
	{
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid value '{v}': {e}"),
			}),
			None => Ok(None),
		}
	}
}

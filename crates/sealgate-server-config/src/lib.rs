// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the sealgate server.
//!
//! Sources are layered with increasing precedence: built-in defaults, a TOML
//! file (`/etc/sealgate/server.toml` or `$SEALGATE_CONFIG_PATH`), then
//! `SEALGATE_SERVER_*` environment variables.
//!
//! ```ignore
//! use sealgate_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, CONFIG_PATH_ENV,
};

use sealgate_server_jobs::CronSchedule;
use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub environment: Environment,
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub keys: KeysConfig,
	pub envelope: EnvelopeConfig,
	pub replay: ReplayConfig,
	pub jobs: JobsConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer and validate it.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		environment: layer.environment.unwrap_or_default(),
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		keys: layer.keys.unwrap_or_default().finalize(),
		envelope: layer.envelope.unwrap_or_default().finalize(),
		replay: layer.replay.unwrap_or_default().finalize(),
		jobs: layer.jobs.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		environment = %config.environment,
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.redacted_url(),
		rotation_schedule = %config.keys.rotation_schedule,
		missing_key_policy = %config.envelope.missing_key_policy,
		exempt_paths = config.envelope.exempt_paths.len(),
		dev_routes = config.envelope.dev_routes,
		replay_enabled = config.replay.enabled,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.envelope.dev_routes && config.environment.is_production() {
		return Err(ConfigError::Validation(
			"envelope.dev_routes is enabled while SEALGATE_SERVER_ENV=production. \
			 The developer routes expose encryption oracles and must not run in production."
				.to_string(),
		));
	}

	if config.keys.rsa_bits < MIN_RSA_BITS {
		return Err(ConfigError::Validation(format!(
			"keys.rsa_bits must be at least {MIN_RSA_BITS}, got {}",
			config.keys.rsa_bits
		)));
	}

	if config.keys.public_key_max_age_secs > config.keys.expiry_buffer_secs {
		return Err(ConfigError::Validation(format!(
			"keys.public_key_max_age_secs ({}) must not exceed keys.expiry_buffer_secs ({})",
			config.keys.public_key_max_age_secs, config.keys.expiry_buffer_secs
		)));
	}

	CronSchedule::parse(&config.keys.rotation_schedule).map_err(|e| {
		ConfigError::InvalidValue {
			key: "keys.rotation_schedule".to_string(),
			message: e.to_string(),
		}
	})?;

	if let Some(bad) = config
		.envelope
		.exempt_paths
		.iter()
		.find(|p| !p.starts_with('/'))
	{
		return Err(ConfigError::InvalidValue {
			key: "envelope.exempt_paths".to_string(),
			message: format!("pattern '{bad}' must start with '/'"),
		});
	}

	if config.envelope.max_body_bytes == 0 {
		return Err(ConfigError::Validation(
			"envelope.max_body_bytes must be greater than zero".to_string(),
		));
	}

	if config.replay.enabled && (config.replay.window_secs == 0 || config.replay.max_entries == 0)
	{
		return Err(ConfigError::Validation(
			"replay.window_secs and replay.max_entries must be positive when replay is enabled"
				.to_string(),
		));
	}

	Ok(())
}

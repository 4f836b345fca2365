// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sealgate server binary.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sealgate_server::{create_app_state, create_key_manager, create_router, jobs::KeyRotationJob};
use sealgate_server_config::{LogFormat, ServerConfig};
use sealgate_server_db::{InMemoryKeyStore, KeyRepository, KeyStore};
use sealgate_server_jobs::{CronSchedule, JobScheduler};
use sealgate_server_keys::{KeyLifecycleManager, RsaKeyGenerator};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod version;

/// Sealgate server - envelope encryption gateway for HTTP payloads.
#[derive(Parser, Debug)]
#[command(
	name = "sealgate-server",
	about = "Envelope encryption gateway for HTTP payloads",
	version
)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Show version and build information
	Version,
	/// Force a key rotation against the configured store and print the new kid
	RotateKey,
	/// Load and validate configuration, then print a summary
	CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let command = args.command.unwrap_or(Command::Serve);

	if let Command::Version = command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = sealgate_server_config::load_config().context("failed to load configuration")?;

	match command {
		Command::CheckConfig => {
			print_config_summary(&config);
			Ok(())
		}
		Command::RotateKey => {
			init_tracing(&config);
			rotate_key(&config).await
		}
		Command::Serve | Command::Version => {
			init_tracing(&config);
			serve(config).await
		}
	}
}

fn init_tracing(config: &ServerConfig) {
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.as_str().into());
	let registry = tracing_subscriber::registry().with(env_filter);

	match config.logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn open_key_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn KeyStore>> {
	if config.database.is_memory() {
		tracing::warn!("using in-memory key store; keys are lost on restart");
		return Ok(Arc::new(InMemoryKeyStore::new()));
	}

	let pool = sealgate_server_db::create_pool(&config.database.url, config.database.max_connections)
		.await
		.context("failed to open key database")?;
	tracing::info!("Running database migrations");
	sealgate_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(Arc::new(KeyRepository::new(pool)))
}

async fn build_key_manager(config: &ServerConfig) -> anyhow::Result<Arc<KeyLifecycleManager>> {
	let store = open_key_store(config).await?;
	let generator = Arc::new(RsaKeyGenerator::new(config.keys.rsa_bits));
	Ok(Arc::new(create_key_manager(config, store, generator)?))
}

async fn rotate_key(config: &ServerConfig) -> anyhow::Result<()> {
	let keys = build_key_manager(config).await?;
	let record = keys.force_rotate().await.context("key rotation failed")?;
	println!("{}", record.kid);
	tracing::info!(kid = %record.kid, expires_at = %record.expires_at, "key rotated");
	Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
	tracing::info!(
		environment = %config.environment,
		addr = %config.socket_addr(),
		"starting sealgate-server"
	);

	let keys = build_key_manager(&config).await?;

	let mut scheduler = JobScheduler::new().with_max_retries(config.jobs.retry_max);
	if config.jobs.rotation_enabled {
		let schedule = CronSchedule::parse(&config.keys.rotation_schedule)
			.context("invalid keys.rotation_schedule")?;
		scheduler.register_cron(Arc::new(KeyRotationJob::new(Arc::clone(&keys))), schedule, true);
	} else {
		tracing::info!("scheduled key rotation disabled; keys rotate on demand");
	}
	let scheduler = Arc::new(scheduler);

	let addr = config.socket_addr();
	let mut state = create_app_state(config, keys)?;
	state.job_scheduler = Some(Arc::clone(&scheduler));

	scheduler.start().await;

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!(%addr, "listening");

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
			tracing::info!("Shutting down job scheduler...");
			scheduler.shutdown().await;
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn print_config_summary(config: &ServerConfig) {
	println!("environment:          {}", config.environment);
	println!("listen:               {}", config.socket_addr());
	println!("base_url:             {}", config.http.base_url);
	println!("database:             {}", config.database.redacted_url());
	println!("log level:            {} ({})", config.logging.level, config.logging.format);
	println!("rsa bits:             {}", config.keys.rsa_bits);
	println!("rotation schedule:    {}", config.keys.rotation_schedule);
	println!("expiry buffer:        {}s", config.keys.expiry_buffer_secs);
	println!("public key max-age:   {}s", config.keys.public_key_max_age_secs);
	println!("context path:         {:?}", config.envelope.context_path);
	println!("exempt paths:         {}", config.envelope.exempt_paths.join(", "));
	println!("missing key policy:   {}", config.envelope.missing_key_policy);
	println!("max body bytes:       {}", config.envelope.max_body_bytes);
	println!("dev routes:           {}", config.envelope.dev_routes);
	println!(
		"replay guard:         {}",
		if config.replay.enabled {
			format!(
				"on ({}s window, {} entries)",
				config.replay.window_secs, config.replay.max_entries
			)
		} else {
			"off".to_string()
		}
	);
	println!(
		"rotation job:         {} (retries {})",
		config.jobs.rotation_enabled, config.jobs.retry_max
	);
}

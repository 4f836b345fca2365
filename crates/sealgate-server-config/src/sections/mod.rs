// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has a resolved form and a partial
//! `*Layer` form used while merging sources.

mod database;
mod envelope;
mod environment;
mod http;
mod jobs;
mod keys;
mod logging;
mod replay;

pub use database::{DatabaseConfig, DatabaseConfigLayer, MEMORY_DATABASE_URL};
pub use envelope::{
	default_exempt_paths, EnvelopeConfig, EnvelopeConfigLayer, MissingKeyPolicy,
	DEFAULT_MAX_BODY_BYTES,
};
pub use environment::Environment;
pub use http::{HttpConfig, HttpConfigLayer};
pub use jobs::{JobsConfig, JobsConfigLayer};
pub use keys::{KeysConfig, KeysConfigLayer, MIN_RSA_BITS};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use replay::{ReplayConfig, ReplayConfigLayer};

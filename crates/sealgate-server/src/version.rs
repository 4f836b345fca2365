// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for sealgate-server.

shadow_rs::shadow!(build);

pub const PLATFORM: &str = env!("SEALGATE_PLATFORM");

#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
	pub version: &'static str,
	pub git_sha: &'static str,
	pub build_timestamp: &'static str,
	pub platform: &'static str,
}

impl BuildInfo {
	#[allow(clippy::const_is_empty)]
	pub const fn current() -> Self {
		Self {
			version: build::PKG_VERSION,
			git_sha: if build::SHORT_COMMIT.is_empty() {
				"unknown"
			} else {
				build::SHORT_COMMIT
			},
			build_timestamp: build::BUILD_TIME,
			platform: PLATFORM,
		}
	}
}

/// Format version info for display.
pub fn format_version_info() -> String {
	use chrono::{DateTime, Utc};

	let info = BuildInfo::current();

	let mut output = format!(
		"sealgate-server version: {}\n\
         Git SHA:                 {}\n\
         Built at:                {}\n\
         Platform:                {}",
		info.version, info.git_sha, info.build_timestamp, info.platform,
	);

	if let Ok(built_at) = DateTime::parse_from_rfc3339(info.build_timestamp)
		.or_else(|_| DateTime::parse_from_str(info.build_timestamp, "%Y-%m-%d %H:%M:%S %:z"))
	{
		let built_at_utc: DateTime<Utc> = built_at.into();
		let age = Utc::now().signed_duration_since(built_at_utc);

		if let Ok(std_duration) = age.to_std() {
			output.push_str(&format!(
				"\nBuild age:               {} ({} seconds)",
				humantime::format_duration(std_duration),
				std_duration.as_secs()
			));
		}
	}

	output
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! When a freshly rotated key expires.

use chrono::{DateTime, Duration, Utc};
use sealgate_server_jobs::CronSchedule;

use crate::error::{KeyError, Result};

/// Midnight UTC on the first day of every month.
pub const DEFAULT_ROTATION_SCHEDULE: &str = "0 0 0 1 * *";

/// Keys expire at the start of the next rotation period.
///
/// The same schedule drives the rotation job, so a key normally lives until
/// the job that replaces it fires.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
	schedule: CronSchedule,
}

impl RotationPolicy {
	pub fn new(schedule: CronSchedule) -> Self {
		Self { schedule }
	}

	pub fn from_expression(expression: &str) -> Result<Self> {
		CronSchedule::parse(expression)
			.map(Self::new)
			.map_err(|e| KeyError::Policy(e.to_string()))
	}

	pub fn schedule(&self) -> &CronSchedule {
		&self.schedule
	}

	/// Expiry for a key created at `now`.
	///
	/// The first period boundary after `now + buffer`, so the new key is
	/// usable the moment it is written even when rotation happens just before
	/// a boundary.
	pub fn expiry_for(&self, now: DateTime<Utc>, buffer: Duration) -> Result<DateTime<Utc>> {
		self.schedule.next_after(now + buffer).ok_or_else(|| {
			KeyError::Policy(format!(
				"schedule {:?} has no occurrence after {now}",
				self.schedule.expression()
			))
		})
	}
}

impl Default for RotationPolicy {
	fn default() -> Self {
		// The default expression is a compile-time constant known to parse.
		Self::from_expression(DEFAULT_ROTATION_SCHEDULE)
			.unwrap_or_else(|e| unreachable!("default rotation schedule: {e}"))
	}
}

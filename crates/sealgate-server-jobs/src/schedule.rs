// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron calendar triggers, evaluated in UTC.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;

use crate::error::{JobError, Result};

/// A parsed cron expression.
///
/// Accepts the 5-field Unix form (`min hour dom month dow`) as well as the
/// 6- and 7-field forms with seconds (and year) understood by the `cron`
/// crate.
#[derive(Clone)]
pub struct CronSchedule {
	expression: String,
	schedule: Schedule,
}

/// Convert a standard 5-field Unix cron expression to the 7-field format
/// expected by the `cron` crate.
fn convert_to_cron_crate_format(expression: &str) -> String {
	if expression.split_whitespace().count() == 5 {
		format!("0 {} *", expression.trim())
	} else {
		expression.trim().to_string()
	}
}

impl CronSchedule {
	pub fn parse(expression: &str) -> Result<Self> {
		let schedule = Schedule::from_str(&convert_to_cron_crate_format(expression))
			.map_err(|e| JobError::InvalidSchedule(format!("{expression:?}: {e}")))?;

		Ok(Self {
			expression: expression.trim().to_string(),
			schedule,
		})
	}

	pub fn expression(&self) -> &str {
		&self.expression
	}

	/// The first occurrence strictly after `after`.
	pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
		self.schedule.after(&after).next()
	}
}

impl fmt::Debug for CronSchedule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("CronSchedule").field(&self.expression).finish()
	}
}

impl FromStr for CronSchedule {
	type Err = JobError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn monthly_schedule_lands_on_first_of_next_month() {
		let schedule = CronSchedule::parse("0 0 0 1 * *").unwrap();
		let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
		assert_eq!(
			schedule.next_after(now).unwrap(),
			Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
		);
	}

	#[test]
	fn next_after_is_strict() {
		let schedule = CronSchedule::parse("0 0 0 1 * *").unwrap();
		let boundary = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
		assert_eq!(
			schedule.next_after(boundary).unwrap(),
			Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
		);
	}

	#[test]
	fn year_rollover() {
		let schedule = CronSchedule::parse("0 0 0 1 * *").unwrap();
		let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
		assert_eq!(
			schedule.next_after(now).unwrap(),
			Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
		);
	}

	#[test]
	fn accepts_five_field_unix_form() {
		let schedule = CronSchedule::parse("30 2 * * *").unwrap();
		assert_eq!(schedule.expression(), "30 2 * * *");
		let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
		assert_eq!(
			schedule.next_after(now).unwrap(),
			Utc.with_ymd_and_hms(2025, 1, 16, 2, 30, 0).unwrap()
		);
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(
			CronSchedule::parse("every tuesday"),
			Err(JobError::InvalidSchedule(_))
		));
		assert!("".parse::<CronSchedule>().is_err());
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory record of job runs.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::types::{JobRun, JobStatus};

const RUNS_KEPT_PER_JOB: usize = 20;

#[derive(Default)]
pub struct RunHistory {
	runs: Mutex<HashMap<String, VecDeque<JobRun>>>,
}

impl RunHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn record_run_start(&self, run: &JobRun) {
		let mut runs = self.runs.lock().await;
		let job_runs = runs.entry(run.job_id.clone()).or_default();
		job_runs.push_back(run.clone());
		while job_runs.len() > RUNS_KEPT_PER_JOB {
			job_runs.pop_front();
		}
	}

	pub async fn record_run_complete(
		&self,
		job_id: &str,
		run_id: &str,
		status: JobStatus,
		retry_count: u32,
		error_message: Option<String>,
		metadata: Option<serde_json::Value>,
	) {
		let mut runs = self.runs.lock().await;
		let Some(run) = runs
			.get_mut(job_id)
			.and_then(|job_runs| job_runs.iter_mut().rev().find(|r| r.id == run_id))
		else {
			return;
		};

		let completed_at = Utc::now();
		run.status = status;
		run.retry_count = retry_count;
		run.duration_ms = Some((completed_at - run.started_at).num_milliseconds());
		run.completed_at = Some(completed_at);
		run.error_message = error_message;
		run.metadata = metadata;
	}

	pub async fn get_last_run(&self, job_id: &str) -> Option<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id).and_then(|job_runs| job_runs.back().cloned())
	}

	/// Failed runs since the most recent non-failed completion.
	pub async fn count_consecutive_failures(&self, job_id: &str) -> u32 {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|job_runs| {
				job_runs
					.iter()
					.rev()
					.filter(|r| r.status != JobStatus::Running)
					.take_while(|r| r.status == JobStatus::Failed)
					.count() as u32
			})
			.unwrap_or(0)
	}

	pub async fn list_runs(&self, job_id: &str) -> Vec<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|job_runs| job_runs.iter().cloned().collect())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TriggerSource;

	fn run(id: &str) -> JobRun {
		JobRun {
			id: id.to_string(),
			job_id: "job".to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count: 0,
			triggered_by: TriggerSource::Schedule,
			metadata: None,
		}
	}

	#[tokio::test]
	async fn counts_trailing_failures_only() {
		let history = RunHistory::new();
		for (id, status) in [
			("a", JobStatus::Failed),
			("b", JobStatus::Succeeded),
			("c", JobStatus::Failed),
			("d", JobStatus::Failed),
		] {
			history.record_run_start(&run(id)).await;
			history
				.record_run_complete("job", id, status, 0, None, None)
				.await;
		}
		assert_eq!(history.count_consecutive_failures("job").await, 2);
		assert_eq!(history.count_consecutive_failures("other").await, 0);
	}

	#[tokio::test]
	async fn completes_the_matching_run() {
		let history = RunHistory::new();
		history.record_run_start(&run("r1")).await;
		history
			.record_run_complete("job", "r1", JobStatus::Failed, 2, Some("boom".into()), None)
			.await;

		let last = history.get_last_run("job").await.unwrap();
		assert_eq!(last.status, JobStatus::Failed);
		assert_eq!(last.retry_count, 2);
		assert_eq!(last.error_message.as_deref(), Some("boom"));
		assert!(last.completed_at.is_some());
	}

	#[tokio::test]
	async fn keeps_a_bounded_window() {
		let history = RunHistory::new();
		for i in 0..(RUNS_KEPT_PER_JOB + 5) {
			history.record_run_start(&run(&format!("r{i}"))).await;
		}
		assert_eq!(history.list_runs("job").await.len(), RUNS_KEPT_PER_JOB);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
use crate::history::RunHistory;
use crate::job::Job;
use crate::schedule::CronSchedule;
use crate::types::{JobRun, JobStatus, JobTrigger, TriggerSource};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const DEFAULT_MAX_RETRIES: u32 = 3;

struct RegisteredJob {
	job: Arc<dyn Job>,
	trigger: JobTrigger,
	run_on_start: bool,
	cancellation_token: CancellationToken,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	history: Arc<RunHistory>,
	max_retries: u32,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl JobScheduler {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: HashMap::new(),
			history: Arc::new(RunHistory::new()),
			max_retries: DEFAULT_MAX_RETRIES,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;
		self
	}

	pub fn register(&mut self, job: Arc<dyn Job>, trigger: JobTrigger, run_on_start: bool) {
		let id = job.id().to_string();
		let run_on_start = run_on_start || matches!(trigger, JobTrigger::OneShot);
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				trigger,
				run_on_start,
				cancellation_token: CancellationToken::new(),
			},
		);
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register(job, JobTrigger::Periodic { interval }, false);
	}

	/// Run `job` at every occurrence of `schedule`, and optionally once as soon
	/// as the scheduler starts.
	pub fn register_cron(&mut self, job: Arc<dyn Job>, schedule: CronSchedule, run_on_start: bool) {
		self.register(job, JobTrigger::Cron { schedule }, run_on_start);
	}

	pub fn register_one_shot(&mut self, job: Arc<dyn Job>) {
		self.register(job, JobTrigger::OneShot, true);
	}

	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			let job = Arc::clone(&registered.job);
			let history = Arc::clone(&self.history);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let trigger = registered.trigger.clone();
			let run_on_start = registered.run_on_start;
			let max_retries = self.max_retries;
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				if run_on_start {
					tokio::select! {
						_ = run_job_with_retry(&job, &history, TriggerSource::Startup, &cancellation_token, max_retries) => {}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutdown during startup run");
							return;
						}
					}
				}

				loop {
					let wait = match &trigger {
						JobTrigger::OneShot => break,
						JobTrigger::Periodic { interval } => *interval,
						JobTrigger::Cron { schedule } => {
							let now = Utc::now();
							let Some(next) = schedule.next_after(now) else {
								warn!(job_id = %job_id, schedule = %schedule.expression(), "Cron schedule has no further occurrences");
								break;
							};
							(next - now).to_std().unwrap_or(Duration::ZERO)
						}
					};

					tokio::select! {
						_ = tokio::time::sleep(wait) => {
							if cancellation_token.is_cancelled() {
								continue;
							}
							let _ = run_job_with_retry(
								&job,
								&history,
								TriggerSource::Schedule,
								&cancellation_token,
								max_retries,
							).await;
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutting down scheduled job");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(job_count = handles.len(), "Job scheduler started");
	}

	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		run_job_with_retry(
			&registered.job,
			&self.history,
			triggered_by,
			&registered.cancellation_token,
			self.max_retries,
		)
		.await
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.keys().cloned().collect()
	}

	pub fn history(&self) -> &Arc<RunHistory> {
		&self.history
	}

	#[instrument(skip(self))]
	pub async fn job_status(&self, job_id: &str) -> Option<JobHealthStatus> {
		let registered = self.jobs.get(job_id)?;

		let last_run = self.history.get_last_run(job_id).await;
		let consecutive_failures = self.history.count_consecutive_failures(job_id).await;
		let status = determine_health_state(&last_run, consecutive_failures);

		Some(JobHealthStatus {
			job_id: job_id.to_string(),
			name: registered.job.name().to_string(),
			trigger: registered.trigger.kind(),
			status,
			last_run: last_run.map(|r| LastRunInfo {
				run_id: r.id,
				status: r.status,
				started_at: r.started_at,
				duration_ms: r.duration_ms,
				error: r.error_message,
			}),
			consecutive_failures,
		})
	}

	#[instrument(skip(self))]
	pub async fn health_status(&self) -> JobsHealthStatus {
		let mut jobs = Vec::new();
		let mut worst_state = HealthState::Healthy;

		for job_id in self.jobs.keys() {
			if let Some(status) = self.job_status(job_id).await {
				worst_state = worst_state.max(status.status);
				jobs.push(status);
			}
		}
		jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));

		JobsHealthStatus {
			status: worst_state,
			jobs,
		}
	}
}

fn determine_health_state(last_run: &Option<JobRun>, consecutive_failures: u32) -> HealthState {
	match last_run {
		None => HealthState::Healthy,
		Some(run) => match run.status {
			JobStatus::Succeeded | JobStatus::Running | JobStatus::Cancelled => HealthState::Healthy,
			JobStatus::Failed => {
				if consecutive_failures >= 3 {
					HealthState::Unhealthy
				} else if consecutive_failures >= 1 {
					HealthState::Degraded
				} else {
					HealthState::Healthy
				}
			}
		},
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	history: &RunHistory,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
	max_retries: u32,
) -> Result<String> {
	let mut retry_count = 0u32;
	let run_id = uuid::Uuid::new_v4().to_string();

	history
		.record_run_start(&JobRun {
			id: run_id.clone(),
			job_id: job.id().to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count,
			triggered_by,
			metadata: None,
		})
		.await;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			attempt: retry_count + 1,
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Succeeded,
						retry_count,
						None,
						output.metadata,
					)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, message = %output.message, "Job completed successfully");
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				history
					.record_run_complete(job.id(), &run_id, JobStatus::Cancelled, retry_count, None, None)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				if retryable && retry_count < max_retries && !cancellation_token.is_cancelled() {
					retry_count += 1;
					let delay_secs = calculate_backoff_delay(retry_count);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						retry_count,
						delay_secs,
						error = %message,
						"Job failed, retrying"
					);
					tokio::time::sleep(Duration::from_secs(delay_secs)).await;
					continue;
				}

				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Failed,
						retry_count,
						Some(message.clone()),
						None,
					)
					.await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Failed,
						retry_count,
						Some(message.clone()),
						None,
					)
					.await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed with error");
				return Err(e);
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}

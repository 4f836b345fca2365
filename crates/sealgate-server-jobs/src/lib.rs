// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for sealgate server.
//!
//! Jobs run on a fixed interval, on a cron calendar trigger, or once at
//! startup. Failed runs marked retryable are retried with exponential
//! backoff. Run outcomes are kept in memory and summarized for the health
//! endpoint.

pub mod context;
pub mod error;
pub mod health;
pub mod history;
pub mod job;
pub mod schedule;
pub mod scheduler;
pub mod types;

pub use context::{CancellationToken, JobContext};
pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use history::RunHistory;
pub use job::Job;
pub use schedule::CronSchedule;
pub use scheduler::JobScheduler;
pub use types::{JobOutput, JobRun, JobStatus, JobTrigger, TriggerSource};

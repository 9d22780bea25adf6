// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Represents the execution context for a job
#[derive(Clone)]
pub struct JobContext {
    pub job_id: String,
    /// Unique per execution, for correlating log lines of one run.
    pub run_id: Uuid,
    pub execution_time: DateTime<Utc>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            run_id: Uuid::new_v4(),
            execution_time: Utc::now(),
        }
    }
}

/// Job execution result. Failed runs are not retried; the next scheduled run
/// is the retry.
#[derive(Debug, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// The job declined to run, e.g. because a previous run was still in flight.
    Skipped,
    Failure { error: String },
}

/// Core trait for all background jobs
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Unique identifier for this job type
    fn job_type(&self) -> &'static str;

    /// Human-readable job name
    fn name(&self) -> String;

    /// Execute the job with given context
    async fn execute(&self, ctx: JobContext) -> Result<JobResult>;
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("type", &self.job_type())
            .field("name", &self.name())
            .finish()
    }
}

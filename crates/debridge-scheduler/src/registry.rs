// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Registered job with its period
struct RegisteredJob {
    job: Arc<dyn Job>,
    period: Duration,
}

/// Job registry that manages and executes interval jobs.
///
/// Each job runs on its own ticker and is awaited inline, so two runs of the
/// same job never overlap; ticks missed while a run is in flight are skipped.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, RegisteredJob>>,
    max_concurrent: usize,
}

impl JobRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Register a job to run every `period`
    pub async fn register(&self, job_id: impl Into<String>, job: impl Job + 'static, period: Duration) {
        let job_id = job_id.into();
        let registered = RegisteredJob {
            job: Arc::new(job) as Arc<dyn Job>,
            period,
        };

        let mut jobs = self.jobs.write().await;
        info!(target: "registry", %job_id, job_type = registered.job.job_type(), ?period, "registering job");
        jobs.insert(job_id, registered);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Run every registered job until the returned future is dropped.
    pub async fn start(self: Arc<Self>) {
        info!(target: "registry", max_concurrent = self.max_concurrent, "starting job registry");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        {
            let jobs = self.jobs.read().await;
            for (job_id, registered) in jobs.iter() {
                tasks.spawn(Self::run_interval(
                    job_id.clone(),
                    registered.job.clone(),
                    registered.period,
                    semaphore.clone(),
                ));
            }
            info!(target: "registry", "job registry started with {} jobs", jobs.len());
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                error!(target: "registry", error = %err, "job loop terminated unexpectedly");
            }
        }
    }

    async fn run_interval(
        job_id: String,
        job: Arc<dyn Job>,
        period: Duration,
        semaphore: Arc<Semaphore>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let Ok(_permit) = semaphore.acquire().await else {
                warn!(target: "registry", %job_id, "semaphore closed, stopping job loop");
                return;
            };
            Self::execute_job(&job_id, job.as_ref()).await;
        }
    }

    /// Execute a single run of a job
    async fn execute_job(job_id: &str, job: &dyn Job) {
        let ctx = JobContext::new(job_id);
        let run_id = ctx.run_id;
        debug!(
            target: "registry",
            job_id = %job_id,
            %run_id,
            job_type = job.job_type(),
            started_at = %ctx.execution_time,
            "executing job"
        );

        match job.execute(ctx).await {
            Ok(JobResult::Success) => {
                debug!(target: "registry", job_id = %job_id, %run_id, "job completed successfully");
            }
            Ok(JobResult::Skipped) => {
                info!(target: "registry", job_id = %job_id, %run_id, "job run skipped");
            }
            Ok(JobResult::Failure { error }) => {
                error!(
                    target: "registry",
                    job_id = %job_id,
                    %run_id,
                    job_type = job.job_type(),
                    %error,
                    "job failed, waiting for next scheduled run"
                );
            }
            Err(err) => {
                error!(
                    target: "registry",
                    job_id = %job_id,
                    %run_id,
                    job_type = job.job_type(),
                    error = %err,
                    "job execution error"
                );
            }
        }
    }
}

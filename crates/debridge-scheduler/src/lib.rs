// SPDX-License-Identifier: GPL-3.0-or-later
pub mod job;
pub mod jobs;
pub mod registry;

use anyhow::Result;
use debridge_application::Reconciler;
use debridge_config::AppConfig;
use registry::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use jobs::ReconcileJob;

pub struct Scheduler {
    config: AppConfig,
    registry: Arc<JobRegistry>,
    reconciler: Arc<Reconciler>,
}

impl Scheduler {
    pub fn new(config: AppConfig, reconciler: Arc<Reconciler>) -> Self {
        let registry = Arc::new(JobRegistry::new(config.scheduler.max_concurrent_jobs));
        Self {
            config,
            registry,
            reconciler,
        }
    }

    /// Register all background jobs with their schedules
    pub async fn register_jobs(&self) {
        info!(target: "scheduler", "registering background jobs");

        let poll_interval = Duration::from_secs(self.config.scheduler.poll_interval_secs);
        self.registry
            .register(
                "reconcile-torrents",
                ReconcileJob::new(self.reconciler.clone()),
                poll_interval,
            )
            .await;

        info!(target: "scheduler", "all jobs registered");
    }

    /// Start the scheduler and return a handle to the background task.
    /// Aborting the handle stops every job loop.
    pub fn start(self) -> JoinHandle<Result<()>> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            registry.start().await;
            Ok(())
        })
    }
}

// Re-export key types for convenience
pub use job::{Job, JobContext, JobResult};

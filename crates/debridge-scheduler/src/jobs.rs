// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use anyhow::Result;
use debridge_application::{Reconciler, TickOutcome};
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciliation job - polls the debrid service and settles finished torrents
pub struct ReconcileJob {
    reconciler: Arc<Reconciler>,
}

impl ReconcileJob {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait::async_trait]
impl Job for ReconcileJob {
    fn job_type(&self) -> &'static str {
        "reconcile_torrents"
    }

    fn name(&self) -> String {
        "Reconcile Debrid Torrents".to_string()
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResult> {
        debug!(target: "jobs", job_id = %ctx.job_id, run_id = %ctx.run_id, "executing reconciliation job");

        match self.reconciler.tick().await {
            TickOutcome::Completed(summary) => {
                if summary.completed > 0 || summary.dropped > 0 {
                    info!(
                        target: "jobs",
                        job_id = %ctx.job_id,
                        completed = summary.completed,
                        dispatched = summary.dispatched,
                        dropped = summary.dropped,
                        "reconciliation settled torrents"
                    );
                }
                Ok(JobResult::Success)
            }
            TickOutcome::Skipped => Ok(JobResult::Skipped),
            TickOutcome::Aborted(err) => Ok(JobResult::Failure {
                error: err.to_string(),
            }),
        }
    }
}

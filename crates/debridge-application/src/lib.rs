// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use debridge_config::AppConfig;
use debridge_realdebrid::DebridApi;
pub mod download_agent;
mod jd_crypto;
pub mod pipeline;
pub mod reconcile;
pub mod submission;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod watch_store;

pub use download_agent::{
    AddLinksQuery, DownloadAgent, DownloadAgentError, JDownloaderClient, JDownloaderSession,
};
pub use pipeline::{DispatchOutcome, DispatchPipeline};
pub use reconcile::{Reconciler, TickOutcome, TickSummary};
pub use submission::{MissingField, SubmissionError, SubmissionService};
pub use watch_store::WatchStore;

use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub watch_store: WatchStore,
    pub submissions: Arc<SubmissionService>,
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Wire the watch store, submission handler and reconciler around the given remotes.
    pub fn new(
        config: AppConfig,
        debrid: Arc<dyn DebridApi>,
        agent: Arc<dyn DownloadAgent>,
    ) -> Self {
        let watch_store = WatchStore::new();
        let submissions = Arc::new(SubmissionService::new(debrid.clone(), watch_store.clone()));
        let pipeline = DispatchPipeline::new(
            debrid.clone(),
            agent,
            config.pipeline.dispatch_when_empty,
        );
        let reconciler = Arc::new(Reconciler::new(debrid, watch_store.clone(), pipeline));

        Self {
            config,
            watch_store,
            submissions,
            reconciler,
        }
    }

    pub fn on_start(&self) {
        info!(target: "application", "application state initialized");
    }
}

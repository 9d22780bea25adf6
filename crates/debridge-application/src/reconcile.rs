// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use debridge_domain::{RemoteTorrent, TorrentOutcome};
use debridge_realdebrid::{DebridApi, DebridError};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::pipeline::DispatchPipeline;
use crate::watch_store::WatchStore;

/// Counts from one completed reconciliation tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Torrents returned by the debrid service, watched or not.
    pub listed: usize,
    /// Watched torrents that finished downloading remotely.
    pub completed: usize,
    /// Completed torrents whose batch reached the download agent.
    pub dispatched: usize,
    /// Watched torrents dropped because of a failure status.
    pub dropped: usize,
    /// Watched torrents still in progress.
    pub pending: usize,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Another tick was still running.
    Skipped,
    /// Listing failed; the watch store was left untouched.
    Aborted(DebridError),
    Completed(TickSummary),
}

/// Polls the debrid service and settles every watched torrent that reached a terminal status.
pub struct Reconciler {
    debrid: Arc<dyn DebridApi>,
    store: WatchStore,
    pipeline: DispatchPipeline,
    running: Mutex<()>,
}

impl Reconciler {
    pub fn new(debrid: Arc<dyn DebridApi>, store: WatchStore, pipeline: DispatchPipeline) -> Self {
        Self {
            debrid,
            store,
            pipeline,
            running: Mutex::new(()),
        }
    }

    /// Wait for a running tick to finish and keep new ticks from starting
    /// until the guard is dropped. Ticks attempted meanwhile are skipped.
    pub async fn hold_ticks(&self) -> MutexGuard<'_, ()> {
        self.running.lock().await
    }

    /// Run one reconciliation tick. At most one tick runs at a time.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_running) = self.running.try_lock() else {
            warn!(target: "reconcile", "previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        let torrents = match self.debrid.list_torrents().await {
            Ok(torrents) => torrents,
            Err(err) => {
                if err.is_auth() {
                    error!(target: "reconcile", error = %err, "failed to connect to debrid service");
                } else {
                    error!(target: "reconcile", error = %err, "request issue while listing torrents");
                }
                return TickOutcome::Aborted(err);
            }
        };

        let mut summary = TickSummary {
            listed: torrents.len(),
            ..TickSummary::default()
        };

        for torrent in &torrents {
            self.reconcile(torrent, &mut summary).await;
        }

        info!(
            target: "reconcile",
            listed = summary.listed,
            completed = summary.completed,
            dispatched = summary.dispatched,
            dropped = summary.dropped,
            pending = summary.pending,
            watching = self.store.len(),
            "tick completed"
        );

        TickOutcome::Completed(summary)
    }

    async fn reconcile(&self, torrent: &RemoteTorrent, summary: &mut TickSummary) {
        let id = &torrent.id;

        match torrent.status.outcome() {
            TorrentOutcome::Pending => {
                if self.store.contains(id) {
                    summary.pending += 1;
                    debug!(target: "reconcile", %id, status = %torrent.status, "torrent still in progress");
                }
            }
            TorrentOutcome::Completed => {
                // Removal happens before dispatch; the torrent is settled regardless of the outcome.
                let Some(path) = self.store.take(id) else {
                    return;
                };
                summary.completed += 1;
                info!(target: "reconcile", %id, %path, "torrent downloaded, resolving links");

                if self.pipeline.resolve_and_dispatch(id, &path).await.is_dispatched() {
                    summary.dispatched += 1;
                }
            }
            TorrentOutcome::Failed(kind) => {
                let Some(path) = self.store.take(id) else {
                    return;
                };
                summary.dropped += 1;
                error!(
                    target: "reconcile",
                    %id,
                    %path,
                    kind = %kind,
                    "torrent failed on debrid service, no longer watching"
                );
            }
        }
    }
}

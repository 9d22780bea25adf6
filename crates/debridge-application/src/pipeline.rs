// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use debridge_domain::TorrentId;
use debridge_realdebrid::DebridApi;
use tracing::{debug, error, info, warn};

use crate::download_agent::DownloadAgent;

/// What happened to a completed torrent once it left the watch store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A batch was handed to the download agent.
    Dispatched { links: usize, skipped: usize },
    /// Every link failed to unrestrict and empty batches are not sent.
    NothingResolved { skipped: usize },
    /// The torrent's file links could not be fetched.
    LinksUnavailable,
    /// The download agent rejected or never received the batch.
    DispatchFailed,
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// Turns a finished torrent into direct URLs and hands them to the download agent.
pub struct DispatchPipeline {
    debrid: Arc<dyn DebridApi>,
    agent: Arc<dyn DownloadAgent>,
    dispatch_when_empty: bool,
}

impl DispatchPipeline {
    pub fn new(
        debrid: Arc<dyn DebridApi>,
        agent: Arc<dyn DownloadAgent>,
        dispatch_when_empty: bool,
    ) -> Self {
        Self {
            debrid,
            agent,
            dispatch_when_empty,
        }
    }

    /// Resolve every file link of `id` and dispatch the result to `destination`.
    ///
    /// Never fails: errors are logged and reflected in the returned outcome so
    /// the caller can carry on with other torrents.
    pub async fn resolve_and_dispatch(&self, id: &TorrentId, destination: &str) -> DispatchOutcome {
        let links = match self.debrid.get_file_links(id).await {
            Ok(links) => links,
            Err(err) => {
                error!(
                    target: "pipeline",
                    %id,
                    path = %destination,
                    error = %err,
                    "failed to fetch torrent links, torrent will not be retried"
                );
                return DispatchOutcome::LinksUnavailable;
            }
        };

        let mut urls = Vec::with_capacity(links.len());
        let mut skipped = 0;
        for link in &links {
            match self.debrid.unrestrict(link).await {
                Ok(url) => {
                    debug!(target: "pipeline", %id, %link, "link unrestricted");
                    urls.push(url);
                }
                Err(err) => {
                    skipped += 1;
                    warn!(
                        target: "pipeline",
                        %id,
                        %link,
                        error = %err,
                        "skipping link that could not be unrestricted"
                    );
                }
            }
        }

        if urls.is_empty() && !self.dispatch_when_empty {
            warn!(
                target: "pipeline",
                %id,
                path = %destination,
                skipped,
                "no links resolved, nothing dispatched"
            );
            return DispatchOutcome::NothingResolved { skipped };
        }

        match self.agent.add_links(&urls, destination).await {
            Ok(()) => {
                info!(
                    target: "pipeline",
                    %id,
                    path = %destination,
                    links = urls.len(),
                    skipped,
                    "dispatched torrent to download agent"
                );
                DispatchOutcome::Dispatched {
                    links: urls.len(),
                    skipped,
                }
            }
            Err(err) => {
                error!(
                    target: "pipeline",
                    %id,
                    path = %destination,
                    error = %err,
                    "failed to dispatch links to download agent"
                );
                DispatchOutcome::DispatchFailed
            }
        }
    }
}

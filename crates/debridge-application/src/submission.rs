// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use debridge_domain::TorrentId;
use debridge_realdebrid::{DebridApi, DebridError};
use thiserror::Error;
use tracing::{error, info};

use crate::watch_store::WatchStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    MagnetUrl,
    Path,
}

impl MissingField {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MagnetUrl => "magnet_url is missing from post.",
            Self::Path => "Path is missing from post.",
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{}", .0.message())]
    Validation(MissingField),

    #[error(transparent)]
    Remote(#[from] DebridError),
}

/// Accepts magnet submissions and starts watching the resulting remote torrent.
pub struct SubmissionService {
    debrid: Arc<dyn DebridApi>,
    store: WatchStore,
}

impl SubmissionService {
    pub fn new(debrid: Arc<dyn DebridApi>, store: WatchStore) -> Self {
        Self { debrid, store }
    }

    /// Send `magnet_url` to the debrid service and watch it for `path`.
    ///
    /// Blank fields are rejected before any network call. The watch store is
    /// only touched once the remote has accepted the magnet and its files.
    pub async fn submit(&self, magnet_url: &str, path: &str) -> Result<TorrentId, SubmissionError> {
        let magnet_url = magnet_url.trim();
        if magnet_url.is_empty() {
            return Err(SubmissionError::Validation(MissingField::MagnetUrl));
        }
        if path.trim().is_empty() {
            return Err(SubmissionError::Validation(MissingField::Path));
        }

        let id = match self.debrid.submit_magnet(magnet_url).await {
            Ok(id) => id,
            Err(err) => {
                error!(target: "submission", error = %err, "failed to submit magnet to debrid service");
                return Err(err.into());
            }
        };

        self.store.insert(id.clone(), path);
        info!(target: "submission", %id, %path, "watching torrent");

        Ok(id)
    }
}

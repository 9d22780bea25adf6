// SPDX-License-Identifier: GPL-3.0-or-later

use debridge_domain::{RemoteTorrent, TorrentId, TorrentStatus};
use serde::{Deserialize, Serialize};

/// Body of a `201 Created` answer to `torrents/addMagnet`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddMagnetResponse {
    pub id: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// One entry of the `torrents` listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentSummary {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub filename: Option<String>,
    /// Remote download progress, 0 to 100.
    #[serde(default)]
    pub progress: Option<f64>,
}

impl From<TorrentSummary> for RemoteTorrent {
    fn from(summary: TorrentSummary) -> Self {
        RemoteTorrent {
            id: TorrentId::new(summary.id),
            status: TorrentStatus::from(summary.status),
        }
    }
}

/// Subset of `torrents/info/{id}`; `links` holds one hoster link per selected file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentInfo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// Answer to `unrestrict/link`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnrestrictedLink {
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

// SPDX-License-Identifier: GPL-3.0-or-later
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Identifier assigned to a torrent by the debrid service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(pub String);

impl TorrentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TorrentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TorrentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TorrentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Status string reported by the debrid service for a torrent.
///
/// Values the service may add in the future land in [`TorrentStatus::Other`]
/// and are treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TorrentStatus {
    MagnetConversion,
    WaitingFilesSelection,
    Queued,
    Downloading,
    Compressing,
    Uploading,
    Downloaded,
    MagnetError,
    Virus,
    Error,
    Dead,
    Other(String),
}

impl TorrentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MagnetConversion => "magnet_conversion",
            Self::WaitingFilesSelection => "waiting_files_selection",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::Downloaded => "downloaded",
            Self::MagnetError => "magnet_error",
            Self::Virus => "virus",
            Self::Error => "error",
            Self::Dead => "dead",
            Self::Other(value) => value,
        }
    }

    /// Classify this status into what the reconciliation loop should do with it.
    pub fn outcome(&self) -> TorrentOutcome {
        match self {
            Self::Downloaded => TorrentOutcome::Completed,
            Self::MagnetError => TorrentOutcome::Failed(FailureKind::MagnetError),
            Self::Virus => TorrentOutcome::Failed(FailureKind::Virus),
            Self::Error => TorrentOutcome::Failed(FailureKind::Error),
            Self::Dead => TorrentOutcome::Failed(FailureKind::Dead),
            _ => TorrentOutcome::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.outcome(), TorrentOutcome::Pending)
    }
}

impl From<&str> for TorrentStatus {
    fn from(value: &str) -> Self {
        match value {
            "magnet_conversion" => Self::MagnetConversion,
            "waiting_files_selection" => Self::WaitingFilesSelection,
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "compressing" => Self::Compressing,
            "uploading" => Self::Uploading,
            "downloaded" => Self::Downloaded,
            "magnet_error" => Self::MagnetError,
            "virus" => Self::Virus,
            "error" => Self::Error,
            "dead" => Self::Dead,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TorrentStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<TorrentStatus> for String {
    fn from(value: TorrentStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure states; a torrent in one of these is dropped, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MagnetError,
    Virus,
    Error,
    Dead,
}

impl FailureKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::MagnetError => "magnet error",
            Self::Virus => "virus detected",
            Self::Error => "generic error",
            Self::Dead => "dead torrent",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentOutcome {
    Pending,
    Completed,
    Failed(FailureKind),
}

// ============================================================================
// Entities
// ============================================================================

/// A torrent as listed by the debrid service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTorrent {
    pub id: TorrentId,
    pub status: TorrentStatus,
}

impl RemoteTorrent {
    pub fn new(id: impl Into<TorrentId>, status: impl Into<TorrentStatus>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}

/// A submitted torrent awaiting a terminal status, and where its files should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedTorrent {
    pub id: TorrentId,
    pub destination_path: String,
}

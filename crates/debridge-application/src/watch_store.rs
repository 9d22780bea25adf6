// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use debridge_domain::{TorrentId, WatchedTorrent};
use tracing::warn;

/// In-memory map of submitted torrents awaiting a terminal status.
///
/// Cloning yields another handle to the same map. Nothing is persisted: a
/// restart forgets every in-flight torrent.
#[derive(Clone, Default)]
pub struct WatchStore {
    entries: Arc<Mutex<HashMap<TorrentId, String>>>,
}

impl WatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TorrentId, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(target: "watch_store", "watch store mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Start watching `id`. Returns the previous destination if the id was already watched.
    pub fn insert(&self, id: TorrentId, destination_path: impl Into<String>) -> Option<String> {
        let previous = self.lock().insert(id.clone(), destination_path.into());
        if previous.is_some() {
            warn!(target: "watch_store", %id, "torrent was already watched, destination replaced");
        }
        previous
    }

    /// Atomically remove `id` and return its destination.
    ///
    /// Only the first caller for a given id receives `Some`, so a terminal
    /// status is acted on exactly once.
    pub fn take(&self, id: &TorrentId) -> Option<String> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &TorrentId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn destination_of(&self, id: &TorrentId) -> Option<String> {
        self.lock().get(id).cloned()
    }

    /// Consistent copy of the whole map, keyed by id.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(id, path)| (id.to_string(), path.clone()))
            .collect()
    }

    pub fn watched(&self) -> Vec<WatchedTorrent> {
        self.lock()
            .iter()
            .map(|(id, path)| WatchedTorrent {
                id: id.clone(),
                destination_path: path.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

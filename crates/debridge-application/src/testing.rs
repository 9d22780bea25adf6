// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory stand-ins for the debrid service and the download agent.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use debridge_domain::{RemoteTorrent, TorrentId};
use debridge_realdebrid::{DebridApi, DebridError};

use crate::download_agent::{DownloadAgent, DownloadAgentError};

/// Scriptable [`DebridApi`]. Links without a configured unrestricted URL fail to resolve.
#[derive(Default)]
pub struct FakeDebrid {
    submission_id: Option<String>,
    submission_failure: Option<(u16, String)>,
    torrents: Mutex<Vec<RemoteTorrent>>,
    list_auth_failure: Option<u16>,
    list_transport_failure: bool,
    list_delay: Option<Duration>,
    links: HashMap<String, Vec<String>>,
    links_failures: HashSet<String>,
    unrestricted: HashMap<String, String>,
    submit_calls: AtomicUsize,
    list_calls: AtomicUsize,
    link_calls: AtomicUsize,
}

impl FakeDebrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submission_id(mut self, id: &str) -> Self {
        self.submission_id = Some(id.to_string());
        self
    }

    pub fn with_submission_failure(mut self, status: u16, body: &str) -> Self {
        self.submission_failure = Some((status, body.to_string()));
        self
    }

    pub fn with_torrents(self, torrents: Vec<RemoteTorrent>) -> Self {
        self.set_torrents(torrents);
        self
    }

    pub fn with_list_auth_failure(mut self, status: u16) -> Self {
        self.list_auth_failure = Some(status);
        self
    }

    /// Listing fails with a genuine connection error.
    pub fn with_list_transport_failure(mut self) -> Self {
        self.list_transport_failure = true;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn with_links(mut self, id: &str, links: &[&str]) -> Self {
        self.links.insert(
            id.to_string(),
            links.iter().map(|link| link.to_string()).collect(),
        );
        self
    }

    pub fn with_links_failure(mut self, id: &str) -> Self {
        self.links_failures.insert(id.to_string());
        self
    }

    pub fn with_unrestricted(mut self, link: &str, url: &str) -> Self {
        self.unrestricted.insert(link.to_string(), url.to_string());
        self
    }

    /// Replace the listing returned by subsequent ticks.
    pub fn set_torrents(&self, torrents: Vec<RemoteTorrent>) {
        *self.torrents.lock().unwrap_or_else(PoisonError::into_inner) = torrents;
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DebridApi for FakeDebrid {
    async fn submit_magnet(&self, _magnet: &str) -> debridge_realdebrid::Result<TorrentId> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((status, body)) = &self.submission_failure {
            return Err(DebridError::Submission {
                status: *status,
                body: body.clone(),
            });
        }

        match &self.submission_id {
            Some(id) => Ok(TorrentId::new(id.clone())),
            None => Err(DebridError::InvalidResponse("no submission id scripted".to_string())),
        }
    }

    async fn list_torrents(&self) -> debridge_realdebrid::Result<Vec<RemoteTorrent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = self.list_auth_failure {
            return Err(DebridError::Auth { status });
        }

        if self.list_transport_failure {
            // Nothing listens on port 1.
            return match reqwest::Client::new().get("http://127.0.0.1:1/torrents").send().await {
                Err(err) => Err(DebridError::Transport(err)),
                Ok(response) => Err(DebridError::InvalidResponse(format!(
                    "unexpected answer from closed port: {}",
                    response.status()
                ))),
            };
        }

        Ok(self
            .torrents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn get_file_links(&self, id: &TorrentId) -> debridge_realdebrid::Result<Vec<String>> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);

        if self.links_failures.contains(id.as_str()) {
            return Err(DebridError::Api {
                status: 404,
                body: "unknown_ressource".to_string(),
            });
        }

        Ok(self.links.get(id.as_str()).cloned().unwrap_or_default())
    }

    async fn unrestrict(&self, link: &str) -> debridge_realdebrid::Result<String> {
        self.unrestricted
            .get(link)
            .cloned()
            .ok_or_else(|| DebridError::Resolution {
                link: link.to_string(),
                reason: "hoster_unavailable".to_string(),
            })
    }
}

/// [`DownloadAgent`] that records every batch it receives.
#[derive(Default)]
pub struct RecordingAgent {
    fail: bool,
    attempts: AtomicUsize,
    dispatches: Mutex<Vec<(Vec<String>, String)>>,
}

impl RecordingAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// An agent whose every dispatch fails at the transport level.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Successful dispatches as `(urls, destination)` pairs.
    pub fn dispatches(&self) -> Vec<(Vec<String>, String)> {
        self.dispatches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every dispatch attempt, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadAgent for RecordingAgent {
    async fn add_links(
        &self,
        urls: &[String],
        destination: &str,
    ) -> Result<(), DownloadAgentError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(DownloadAgentError::Request("connection refused".to_string()));
        }

        self.dispatches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((urls.to_vec(), destination.to_string()));
        Ok(())
    }
}

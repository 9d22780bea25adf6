// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{DebridError, Result};
use crate::models::{AddMagnetResponse, TorrentInfo, TorrentSummary, UnrestrictedLink};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use debridge_domain::{RemoteTorrent, TorrentId};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const REAL_DEBRID_API_BASE: &str = "https://api.real-debrid.com/rest/1.0/";
const USER_AGENT: &str = concat!("debridge/", env!("CARGO_PKG_VERSION"));
const DEFAULT_PAGE_SIZE: u32 = 100;
/// Upper bound on listing pages fetched per call.
const MAX_LIST_PAGES: u32 = 50;

/// The remote operations the bridge performs against a debrid service.
#[async_trait]
pub trait DebridApi: Send + Sync {
    /// Add a magnet and select all of its files. Returns the remote torrent id.
    async fn submit_magnet(&self, magnet: &str) -> Result<TorrentId>;

    /// List every torrent on the account with its current status.
    async fn list_torrents(&self) -> Result<Vec<RemoteTorrent>>;

    /// Hoster links for the files of a finished torrent.
    async fn get_file_links(&self, id: &TorrentId) -> Result<Vec<String>>;

    /// Convert a hoster link into a direct download URL.
    async fn unrestrict(&self, link: &str) -> Result<String>;
}

/// Real-Debrid API client authenticated with a private API token.
#[derive(Clone)]
pub struct RealDebridClient {
    client: Client,
    base_url: String,
    api_token: String,
    page_size: u32,
    rate_limiter: RateLimiter,
}

impl fmt::Debug for RealDebridClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealDebridClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RealDebridClient {
    /// Create a client builder for custom configuration.
    pub fn builder() -> RealDebridClientBuilder {
        RealDebridClientBuilder::default()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| DebridError::InvalidResponse(format!("invalid endpoint url: {}", e)))
    }

    /// Send an authenticated request and return its status and body.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        self.rate_limiter.acquire().await;

        let response = request.bearer_auth(&self.api_token).send().await?;
        let status = response.status();
        debug!(target: "realdebrid", "response status: {}", status);

        let body = response.text().await?;
        trace!(target: "realdebrid", "response body: {}", body);

        Ok((status, body))
    }

    fn ensure_authorized(status: StatusCode) -> Result<()> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DebridError::Auth {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn parse<T: DeserializeOwned>(body: &str) -> Result<T> {
        serde_json::from_str(body)
            .map_err(|e| DebridError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    async fn add_magnet(&self, magnet: &str) -> Result<String> {
        let url = self.endpoint("torrents/addMagnet")?;
        trace!(target: "realdebrid", "POST {}", url);

        let (status, body) = self
            .send(self.client.post(url).form(&[("magnet", magnet)]))
            .await?;
        Self::ensure_authorized(status)?;

        if status != StatusCode::CREATED {
            return Err(DebridError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let added: AddMagnetResponse = Self::parse(&body)?;
        Ok(added.id)
    }

    async fn select_all_files(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&format!("torrents/selectFiles/{}", id))?;
        trace!(target: "realdebrid", "POST {}", url);

        let (status, body) = self
            .send(self.client.post(url).form(&[("files", "all")]))
            .await?;
        Self::ensure_authorized(status)?;

        if status != StatusCode::NO_CONTENT && status != StatusCode::ACCEPTED {
            return Err(DebridError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn list_page(&self, page: u32) -> Result<Vec<TorrentSummary>> {
        let mut url = self.endpoint("torrents")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("page", &page.to_string());
        trace!(target: "realdebrid", "GET {}", url);

        let (status, body) = self.send(self.client.get(url)).await?;
        Self::ensure_authorized(status)?;

        // An account (or page) without torrents answers 204 with no body.
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        if !status.is_success() {
            return Err(DebridError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse(&body)
    }
}

#[async_trait]
impl DebridApi for RealDebridClient {
    async fn submit_magnet(&self, magnet: &str) -> Result<TorrentId> {
        let id = self.add_magnet(magnet).await?;
        debug!(target: "realdebrid", %id, "magnet accepted, selecting all files");
        self.select_all_files(&id).await?;
        Ok(TorrentId::new(id))
    }

    async fn list_torrents(&self) -> Result<Vec<RemoteTorrent>> {
        let mut torrents = Vec::new();

        for page in 1..=MAX_LIST_PAGES {
            let batch = self.list_page(page).await?;
            let fetched = batch.len();
            torrents.extend(batch.into_iter().map(RemoteTorrent::from));

            if fetched < self.page_size as usize {
                break;
            }
        }

        debug!(target: "realdebrid", count = torrents.len(), "listed torrents");
        Ok(torrents)
    }

    async fn get_file_links(&self, id: &TorrentId) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("torrents/info/{}", id))?;
        trace!(target: "realdebrid", "GET {}", url);

        let (status, body) = self.send(self.client.get(url)).await?;
        Self::ensure_authorized(status)?;

        if !status.is_success() {
            return Err(DebridError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let info: TorrentInfo = Self::parse(&body)?;
        Ok(info.links)
    }

    async fn unrestrict(&self, link: &str) -> Result<String> {
        let url = self.endpoint("unrestrict/link")?;
        trace!(target: "realdebrid", "POST {}", url);

        let (status, body) = self
            .send(self.client.post(url).form(&[("link", link)]))
            .await?;

        let resolution_error = |reason: String| DebridError::Resolution {
            link: link.to_string(),
            reason,
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(resolution_error(format!(
                "authorization rejected (status {})",
                status.as_u16()
            )));
        }

        if !status.is_success() {
            return Err(resolution_error(format!(
                "unexpected status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let unrestricted: UnrestrictedLink = serde_json::from_str(&body)
            .map_err(|e| resolution_error(format!("malformed response: {}", e)))?;

        unrestricted
            .download
            .ok_or_else(|| resolution_error("response has no download url".to_string()))
    }
}

/// Builder for configuring a Real-Debrid client.
#[derive(Debug)]
pub struct RealDebridClientBuilder {
    base_url: String,
    api_token: String,
    timeout: Duration,
    page_size: u32,
    rate_limit_interval: Option<Duration>,
}

impl Default for RealDebridClientBuilder {
    fn default() -> Self {
        Self {
            base_url: REAL_DEBRID_API_BASE.to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit_interval: None,
        }
    }
}

impl RealDebridClientBuilder {
    /// Set a custom base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = token.into();
        self
    }

    /// Set request timeout duration. Applies to every call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of torrents requested per listing page.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set rate limit interval between requests.
    pub fn rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = Some(interval);
        self
    }

    /// Build the Real-Debrid client.
    pub fn build(self) -> Result<RealDebridClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let rate_limiter = match self.rate_limit_interval {
            Some(interval) => RateLimiter::new(interval),
            None => RateLimiter::real_debrid_default(),
        };

        Ok(RealDebridClient {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_token: self.api_token,
            page_size: self.page_size,
            rate_limiter,
        })
    }
}

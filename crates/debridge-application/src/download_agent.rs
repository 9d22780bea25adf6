use async_trait::async_trait;
use debridge_config::JDownloaderConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::jd_crypto::{self, Secret};

/// Characters left unescaped in query values, matching the reference client.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

const DEVICE_CONTENT_TYPE: &str = "application/aesjson-jd; charset=utf-8";
const ADD_LINKS_ACTION: &str = "/linkgrabberv2/addLinks";

#[derive(Debug, Error)]
pub enum DownloadAgentError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("authentication failed")]
    Authentication,
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("download agent responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("deserialization failed: {0}")]
    Deserialization(String),
    #[error("encryption failed: {0}")]
    Crypto(String),
    #[error("no device named {0} is registered on the account")]
    DeviceNotFound(String),
}

/// A local application that downloads direct URLs to disk.
#[async_trait]
pub trait DownloadAgent: Send + Sync {
    /// Queue every url for download into `destination`, starting immediately.
    async fn add_links(&self, urls: &[String], destination: &str)
        -> Result<(), DownloadAgentError>;
}

/// Parameters of the linkgrabber `addLinks` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinksQuery {
    pub autostart: bool,
    pub links: String,
    pub destination_folder: String,
    pub overwrite_packagizer_rules: bool,
}

impl AddLinksQuery {
    pub fn new(urls: &[String], destination: &str) -> Self {
        Self {
            autostart: true,
            links: urls.join("\n"),
            destination_folder: destination.to_string(),
            overwrite_packagizer_rules: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceCall<'a> {
    url: &'a str,
    params: Vec<String>,
    rid: u64,
    api_ver: u32,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    sessiontoken: String,
}

#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    #[serde(default)]
    list: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    id: String,
    name: String,
}

/// Tokens of an established account session bound to one device.
#[derive(Clone)]
struct DeviceLink {
    session_token: String,
    device_id: String,
    device_secret: Secret,
}

/// Long-lived My.JDownloader account session targeting one named device.
///
/// Built once at startup and shared by every dispatch. `connect` signs in,
/// lists the account's devices and binds the one called `device_name`; a
/// failed call drops the binding so the next dispatch signs in again.
pub struct JDownloaderSession {
    client: Client,
    api_url: String,
    app_key: String,
    email: String,
    password: String,
    device_name: String,
    link: Mutex<Option<DeviceLink>>,
    next_rid: AtomicU64,
}

impl JDownloaderSession {
    pub fn new(
        api_url: String,
        app_key: String,
        email: String,
        password: String,
        device_name: String,
        timeout: Duration,
    ) -> Result<Self, DownloadAgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| DownloadAgentError::Request(e.to_string()))?;

        // Request ids must keep increasing across restarts.
        let first_rid = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(1);

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_key,
            email,
            password,
            device_name,
            link: Mutex::new(None),
            next_rid: AtomicU64::new(first_rid),
        })
    }

    pub fn from_config(config: &JDownloaderConfig) -> Result<Self, DownloadAgentError> {
        Self::new(
            config.api_url.clone(),
            config.app_key.clone(),
            config.email.clone(),
            config.password.clone(),
            config.device_name.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_connected(&self) -> bool {
        self.lock_link().is_some()
    }

    fn lock_link(&self) -> MutexGuard<'_, Option<DeviceLink>> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_link(&self) -> Option<DeviceLink> {
        self.lock_link().clone()
    }

    fn mark_disconnected(&self) {
        self.lock_link().take();
    }

    fn rid(&self) -> u64 {
        self.next_rid.fetch_add(1, Ordering::Relaxed)
    }

    fn endpoint(&self, path_and_query: &str) -> Result<Url, DownloadAgentError> {
        Url::parse(&format!("{}{}", self.api_url, path_and_query))
            .map_err(|err| DownloadAgentError::InvalidBaseUrl(err.to_string()))
    }

    /// Sign in, then bind the device named `device_name`. Returns its device id.
    pub async fn connect(&self) -> Result<String, DownloadAgentError> {
        self.mark_disconnected();

        let login_secret = jd_crypto::account_secret(&self.email, &self.password, "server");
        let device_secret = jd_crypto::account_secret(&self.email, &self.password, "device");

        let session: ConnectResponse = self
            .server_call(
                "/my/connect",
                &[("email", self.email.as_str()), ("appkey", self.app_key.as_str())],
                &login_secret,
            )
            .await?;

        let server_secret = jd_crypto::session_secret(&login_secret, &session.sessiontoken)?;
        let device_secret = jd_crypto::session_secret(&device_secret, &session.sessiontoken)?;
        debug!(target: "jdownloader", "account session established, listing devices");

        let devices: DeviceListResponse = self
            .server_call(
                "/my/listdevices",
                &[("sessiontoken", session.sessiontoken.as_str())],
                &server_secret,
            )
            .await?;

        let Some(device) = devices
            .list
            .into_iter()
            .find(|device| device.name == self.device_name)
        else {
            warn!(target: "jdownloader", device = %self.device_name, "device not registered on the account");
            return Err(DownloadAgentError::DeviceNotFound(self.device_name.clone()));
        };

        info!(
            target: "jdownloader",
            device = %self.device_name,
            device_id = %device.id,
            "download agent session established"
        );

        *self.lock_link() = Some(DeviceLink {
            session_token: session.sessiontoken,
            device_id: device.id.clone(),
            device_secret,
        });

        Ok(device.id)
    }

    /// Signed GET against the account server; the reply is encrypted with `secret`.
    async fn server_call<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        secret: &Secret,
    ) -> Result<T, DownloadAgentError> {
        let mut query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={}", utf8_percent_encode(value, QUERY_VALUE)))
            .collect();
        query.push(format!("rid={}", self.rid()));

        let unsigned = format!("{path}?{}", query.join("&"));
        let signature = jd_crypto::sign(secret, &unsigned)?;
        let url = self.endpoint(&format!("{unsigned}&signature={signature}"))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadAgentError::Request(e.to_string()))?;

        let body = Self::checked_body(response).await?;
        let plaintext = jd_crypto::decrypt(secret, &body)?;
        serde_json::from_str(&plaintext).map_err(|e| DownloadAgentError::Deserialization(e.to_string()))
    }

    /// Encrypted POST relayed by the account server to the bound device.
    async fn device_call(
        &self,
        link: &DeviceLink,
        action: &str,
        params: Vec<String>,
    ) -> Result<serde_json::Value, DownloadAgentError> {
        let path = format!(
            "/t_{}_{}{action}",
            utf8_percent_encode(&link.session_token, QUERY_VALUE),
            utf8_percent_encode(&link.device_id, QUERY_VALUE),
        );
        let url = self.endpoint(&path)?;

        let call = DeviceCall {
            url: action,
            params,
            rid: self.rid(),
            api_ver: 1,
        };
        let payload = serde_json::to_string(&call)
            .map_err(|e| DownloadAgentError::Deserialization(e.to_string()))?;
        let encrypted = jd_crypto::encrypt(&link.device_secret, &payload)?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, DEVICE_CONTENT_TYPE)
            .body(encrypted)
            .send()
            .await
            .map_err(|e| DownloadAgentError::Request(e.to_string()))?;

        let body = Self::checked_body(response).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        let plaintext = jd_crypto::decrypt(&link.device_secret, &body)?;
        let parsed: DeviceResponse = serde_json::from_str(&plaintext)
            .map_err(|e| DownloadAgentError::Deserialization(e.to_string()))?;
        Ok(parsed.data)
    }

    async fn checked_body(response: reqwest::Response) -> Result<String, DownloadAgentError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DownloadAgentError::Request(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DownloadAgentError::Authentication);
        }

        if !status.is_success() {
            return Err(DownloadAgentError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// [`DownloadAgent`] backed by a My.JDownloader device session.
#[derive(Clone)]
pub struct JDownloaderClient {
    session: Arc<JDownloaderSession>,
}

impl JDownloaderClient {
    pub fn new(session: Arc<JDownloaderSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &JDownloaderSession {
        &self.session
    }
}

#[async_trait]
impl DownloadAgent for JDownloaderClient {
    async fn add_links(
        &self,
        urls: &[String],
        destination: &str,
    ) -> Result<(), DownloadAgentError> {
        let link = match self.session.current_link() {
            Some(link) => link,
            None => {
                info!(
                    target: "jdownloader",
                    device = %self.session.device_name(),
                    "session not established, reconnecting before dispatch"
                );
                self.session.connect().await?;
                self.session
                    .current_link()
                    .ok_or(DownloadAgentError::Authentication)?
            }
        };

        let query = AddLinksQuery::new(urls, destination);
        let params = vec![serde_json::to_string(&query)
            .map_err(|e| DownloadAgentError::Deserialization(e.to_string()))?];

        match self.session.device_call(&link, ADD_LINKS_ACTION, params).await {
            Ok(_) => {
                info!(
                    target: "jdownloader",
                    device = %self.session.device_name(),
                    path = %destination,
                    links = urls.len(),
                    "sent links to jdownloader"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    target: "jdownloader",
                    error = %err,
                    "dispatch failed, session will be re-established on next dispatch"
                );
                self.session.mark_disconnected();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AddLinksQuery, DownloadAgent, DownloadAgentError, JDownloaderClient, JDownloaderSession};
    use crate::jd_crypto::{self, Secret};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const EMAIL: &str = "User@Example.com";
    const PASSWORD: &str = "hunter2";
    const SESSION_TOKEN: &str = "a1b2c3d4";
    const DEVICE_ID: &str = "dev-42";

    fn session(server: &MockServer, device_name: &str) -> Arc<JDownloaderSession> {
        Arc::new(
            JDownloaderSession::new(
                server.uri(),
                "JDRD".to_string(),
                EMAIL.to_string(),
                PASSWORD.to_string(),
                device_name.to_string(),
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    fn login_secret() -> Secret {
        jd_crypto::account_secret(EMAIL, PASSWORD, "server")
    }

    fn server_secret() -> Secret {
        jd_crypto::session_secret(&login_secret(), SESSION_TOKEN).unwrap()
    }

    fn device_secret() -> Secret {
        let secret = jd_crypto::account_secret(EMAIL, PASSWORD, "device");
        jd_crypto::session_secret(&secret, SESSION_TOKEN).unwrap()
    }

    fn encrypted(secret: &Secret, body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(jd_crypto::encrypt(secret, &body.to_string()).unwrap())
    }

    /// True when the request's `signature` is the HMAC of everything before it.
    fn signed_with(secret: Secret) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
        move |request: &Request| {
            let Some(query) = request.url.query() else {
                return false;
            };
            let Some((unsigned, signature)) = query.rsplit_once("&signature=") else {
                return false;
            };
            let expected = jd_crypto::sign(&secret, &format!("{}?{unsigned}", request.url.path()));
            expected.map_or(false, |expected| expected == signature)
        }
    }

    async fn mount_account(server: &MockServer, expected_connects: u64) {
        Mock::given(method("GET"))
            .and(path("/my/connect"))
            .and(query_param("email", EMAIL))
            .and(query_param("appkey", "JDRD"))
            .and(signed_with(login_secret()))
            .respond_with(encrypted(
                &login_secret(),
                serde_json::json!({"sessiontoken": SESSION_TOKEN, "regaintoken": "ff00", "rid": 1}),
            ))
            .expect(expected_connects)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/my/listdevices"))
            .and(query_param("sessiontoken", SESSION_TOKEN))
            .and(signed_with(server_secret()))
            .respond_with(encrypted(
                &server_secret(),
                serde_json::json!({
                    "list": [
                        {"id": "dev-1", "name": "desktop", "type": "jd"},
                        {"id": DEVICE_ID, "name": "nas", "type": "jd"}
                    ],
                    "rid": 2
                }),
            ))
            .expect(expected_connects)
            .mount(server)
            .await;
    }

    fn add_links_path() -> String {
        format!("/t_{SESSION_TOKEN}_{DEVICE_ID}/linkgrabberv2/addLinks")
    }

    fn device_ok() -> ResponseTemplate {
        encrypted(&device_secret(), serde_json::json!({"data": null, "rid": 3}))
    }

    #[test]
    fn add_links_query_joins_urls_with_newlines() {
        let query = AddLinksQuery::new(
            &["https://d/1".to_string(), "https://d/2".to_string()],
            "/movies",
        );
        let json = serde_json::to_value(&query).unwrap();

        assert_eq!(json["links"], "https://d/1\nhttps://d/2");
        assert_eq!(json["destinationFolder"], "/movies");
        assert_eq!(json["autostart"], true);
        assert_eq!(json["overwritePackagizerRules"], true);
    }

    #[tokio::test]
    async fn connect_binds_device_by_name() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;

        let session = session(&server, "nas");
        assert!(!session.is_connected());

        let device_id = session.connect().await.unwrap();
        assert_eq!(device_id, DEVICE_ID);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn unknown_device_name_is_rejected() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;

        let session = session(&server, "laptop");
        let result = session.connect().await;

        assert!(matches!(result, Err(DownloadAgentError::DeviceNotFound(name)) if name == "laptop"));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn add_links_sends_encrypted_batch_to_bound_device() {
        let server = MockServer::start().await;
        mount_account(&server, 1).await;

        Mock::given(method("POST"))
            .and(path(add_links_path()))
            .and(header("content-type", "application/aesjson-jd; charset=utf-8"))
            .and(|request: &Request| {
                let body = String::from_utf8_lossy(&request.body).to_string();
                let Ok(plaintext) = jd_crypto::decrypt(&device_secret(), &body) else {
                    return false;
                };
                let call: serde_json::Value = serde_json::from_str(&plaintext).unwrap();
                let query: serde_json::Value =
                    serde_json::from_str(call["params"][0].as_str().unwrap()).unwrap();
                call["url"] == "/linkgrabberv2/addLinks"
                    && call["apiVer"] == 1
                    && query["links"] == "https://d/1\nhttps://d/2"
                    && query["destinationFolder"] == "/movies"
            })
            .respond_with(device_ok())
            .expect(1)
            .mount(&server)
            .await;

        let client = JDownloaderClient::new(session(&server, "nas"));
        let result = client
            .add_links(
                &["https://d/1".to_string(), "https://d/2".to_string()],
                "/movies",
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_never_reaches_the_account() {
        let server = MockServer::start().await;
        mount_account(&server, 0).await;

        let session = Arc::new(
            JDownloaderSession::new(
                server.uri(),
                "JDRD".to_string(),
                EMAIL.to_string(),
                "not-the-password".to_string(),
                "nas".to_string(),
                Duration::from_secs(5),
            )
            .unwrap(),
        );

        let result = session.connect().await;
        assert!(matches!(result, Err(DownloadAgentError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn failed_dispatch_forces_reconnect_on_next_call() {
        let server = MockServer::start().await;
        mount_account(&server, 2).await;

        Mock::given(method("POST"))
            .and(path(add_links_path()))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(add_links_path()))
            .respond_with(device_ok())
            .mount(&server)
            .await;

        let client = JDownloaderClient::new(session(&server, "nas"));
        let urls = vec!["https://d/1".to_string()];

        let first = client.add_links(&urls, "/movies").await;
        assert!(matches!(
            first,
            Err(DownloadAgentError::HttpStatus { status: 500, .. })
        ));
        assert!(!client.session().is_connected());

        let second = client.add_links(&urls, "/movies").await;
        assert!(second.is_ok());
        assert!(client.session().is_connected());
    }

    #[tokio::test]
    async fn rejected_credentials_are_authentication_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/connect"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = JDownloaderClient::new(session(&server, "nas"));
        let result = client.add_links(&["https://d/1".to_string()], "/movies").await;

        assert!(matches!(result, Err(DownloadAgentError::Authentication)));
    }
}

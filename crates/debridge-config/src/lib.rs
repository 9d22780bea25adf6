// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Real-Debrid will not finish a torrent in under two and a half minutes, so
/// polling faster than this only adds load on their servers.
pub const MIN_RECOMMENDED_POLL_SECS: u64 = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4248,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: MIN_RECOMMENDED_POLL_SECS,
            max_concurrent_jobs: 1,
        }
    }
}

/// Shared secret expected verbatim in the `Authorization` header.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealDebridConfig {
    pub api_token: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
}

impl Default for RealDebridConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.real-debrid.com/rest/1.0/".to_string(),
            request_timeout_secs: 30,
            page_size: 100,
        }
    }
}

/// My.JDownloader account and the device that receives finished downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JDownloaderConfig {
    pub api_url: String,
    pub app_key: String,
    pub email: String,
    pub password: String,
    pub device_name: String,
    pub request_timeout_secs: u64,
}

impl Default for JDownloaderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.jdownloader.org".to_string(),
            app_key: "JDRD".to_string(),
            email: String::new(),
            password: String::new(),
            device_name: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Send a batch to the download agent even when none of a torrent's links
    /// could be unrestricted.
    pub dispatch_when_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
    pub realdebrid: RealDebridConfig,
    pub jdownloader: JDownloaderConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            bail!("api.api_key must be set");
        }
        if self.realdebrid.api_token.trim().is_empty() {
            bail!("realdebrid.api_token must be set");
        }
        if self.jdownloader.email.trim().is_empty() || self.jdownloader.password.is_empty() {
            bail!("jdownloader.email and jdownloader.password must be set");
        }
        if self.jdownloader.device_name.trim().is_empty() {
            bail!("jdownloader.device_name must be set");
        }
        if self.scheduler.poll_interval_secs == 0 {
            bail!("scheduler.poll_interval_secs must be greater than zero");
        }
        if self.realdebrid.page_size == 0 {
            bail!("realdebrid.page_size must be greater than zero");
        }
        if self.scheduler.poll_interval_secs < MIN_RECOMMENDED_POLL_SECS {
            warn!(
                target: "config",
                poll_interval_secs = self.scheduler.poll_interval_secs,
                recommended = MIN_RECOMMENDED_POLL_SECS,
                "poll interval is below the minimum torrent completion latency"
            );
        }
        Ok(())
    }
}

const ENV_PREFIX: &str = "DEBRIDGE_";

/// Secrets and names taken from the environment verbatim. The generic env
/// provider would turn `12345` into an integer or `007` into `7`.
const VERBATIM_KEYS: &[&str] = &[
    "api.api_key",
    "realdebrid.api_token",
    "jdownloader.email",
    "jdownloader.password",
    "jdownloader.device_name",
];

fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_uppercase())
}

fn build_figment(config_path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    for key in VERBATIM_KEYS {
        if let Ok(value) = std::env::var(env_var_name(key)) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }

    figment
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: DEBRIDGE_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config: AppConfig = build_figment(config_path).extract()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.api_key = "secret".to_string();
        config.realdebrid.api_token = "token".to_string();
        config.jdownloader.email = "me@example.com".to_string();
        config.jdownloader.password = "hunter2".to_string();
        config.jdownloader.device_name = "nas".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 4248);
        assert_eq!(config.scheduler.poll_interval_secs, 150);
        assert_eq!(
            config.realdebrid.base_url,
            "https://api.real-debrid.com/rest/1.0/"
        );
        assert_eq!(config.jdownloader.api_url, "https://api.jdownloader.org");
        assert_eq!(config.jdownloader.app_key, "JDRD");
        assert!(!config.pipeline.dispatch_when_empty);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(
                r#"
                [api]
                api_key = "from-toml"

                [scheduler]
                poll_interval_secs = 300

                [jdownloader]
                device_name = "nas"
                email = "me@example.com"
                "#,
            ))
            .extract()
            .expect("config should extract");

        assert_eq!(config.api.api_key, "from-toml");
        assert_eq!(config.scheduler.poll_interval_secs, 300);
        assert_eq!(config.jdownloader.device_name, "nas");
        assert_eq!(config.jdownloader.email, "me@example.com");
        assert!(config.jdownloader.password.is_empty());
        assert_eq!(config.http.port, 4248);
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_secrets() {
        let mut config = valid();
        config.api.api_key = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.realdebrid.api_token.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_jdownloader_account() {
        let mut config = valid();
        config.jdownloader.password.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.jdownloader.device_name = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn numeric_secrets_from_env_stay_strings() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DEBRIDGE_API__API_KEY", "12345");
            jail.set_env("DEBRIDGE_JDOWNLOADER__PASSWORD", "007");
            jail.set_env("DEBRIDGE_JDOWNLOADER__DEVICE_NAME", "2024");
            jail.set_env("DEBRIDGE_SCHEDULER__POLL_INTERVAL_SECS", "300");

            let config = load(None).map_err(|e| e.to_string())?;

            assert_eq!(config.api.api_key, "12345");
            assert_eq!(config.jdownloader.password, "007");
            assert_eq!(config.jdownloader.device_name, "2024");
            assert_eq!(config.scheduler.poll_interval_secs, 300);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "debridge.toml",
                r#"
                [api]
                api_key = "from-file"

                [realdebrid]
                api_token = "file-token"
                "#,
            )?;
            jail.set_env("DEBRIDGE_API__API_KEY", "from-env");

            let config = load(Some(Path::new("debridge.toml"))).map_err(|e| e.to_string())?;

            assert_eq!(config.api.api_key, "from-env");
            assert_eq!(config.realdebrid.api_token, "file-token");
            Ok(())
        });
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = valid();
        config.scheduler.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_interval_is_allowed() {
        let mut config = valid();
        config.scheduler.poll_interval_secs = 30;
        assert!(config.validate().is_ok());
    }
}

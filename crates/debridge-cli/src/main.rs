// SPDX-License-Identifier: GPL-3.0-or-later
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::serve;
use debridge_api::router;
use debridge_application::{AppState, JDownloaderClient, JDownloaderSession};
use debridge_config::{load as load_config, AppConfig, HttpConfig, TelemetryConfig};
use debridge_realdebrid::RealDebridClient;
use debridge_scheduler::Scheduler;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_PATH_ENV: &str = "DEBRIDGE_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    init_tracing(&config.telemetry);
    announce_config(&config, config_path.as_deref());
    config.validate()?;

    let debrid = RealDebridClient::builder()
        .base_url(config.realdebrid.base_url.clone())
        .api_token(config.realdebrid.api_token.clone())
        .timeout(Duration::from_secs(config.realdebrid.request_timeout_secs))
        .page_size(config.realdebrid.page_size)
        .build()
        .context("failed to build Real-Debrid client")?;

    let session = Arc::new(
        JDownloaderSession::from_config(&config.jdownloader)
            .context("failed to build JDownloader session")?,
    );
    match session.connect().await {
        Ok(device_id) => info!(target: "cli", device = session.device_name(), %device_id, "connected to JDownloader"),
        Err(err) => warn!(
            target: "cli",
            device = session.device_name(),
            error = %err,
            "JDownloader unreachable at startup, will reconnect on first dispatch"
        ),
    }

    let state = AppState::new(
        config.clone(),
        Arc::new(debrid),
        Arc::new(JDownloaderClient::new(session)),
    );
    state.on_start();
    let watch_store = state.watch_store.clone();
    let reconciler = state.reconciler.clone();

    let scheduler = Scheduler::new(config.clone(), state.reconciler.clone());
    scheduler.register_jobs().await;
    let scheduler_handle = scheduler.start();

    let listener = TcpListener::bind(bind_addr(&config.http)?).await?;
    let addr = listener.local_addr()?;
    info!(target: "cli", "listening on {}", addr);

    serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight tick finish dispatching before the scheduler goes away.
    let _hold = reconciler.hold_ticks().await;
    scheduler_handle.abort();
    for torrent in watch_store.watched() {
        warn!(
            target: "cli",
            id = %torrent.id,
            path = %torrent.destination_path,
            "torrent still watched at shutdown, tracking is lost"
        );
    }
    info!(target: "cli", "shutdown complete");

    Ok(())
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.as_str()));

    let json_layer = telemetry.json.then(|| fmt::layer().json().with_target(true));
    let text_layer = (!telemetry.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_level(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Runs once the subscriber is installed so the line is not dropped.
fn announce_config(config: &AppConfig, config_path: Option<&Path>) {
    info!(
        target: "cli",
        config_path = ?config_path,
        device = %config.jdownloader.device_name,
        poll_interval_secs = config.scheduler.poll_interval_secs,
        "configuration loaded"
    );
}

fn bind_addr(http: &HttpConfig) -> Result<SocketAddr> {
    let addr = format!("{}:{}", http.host, http.port);
    addr.parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {addr}"))
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target: "cli", error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target: "cli", error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }

    info!(target: "cli", "shutdown signal received");
}

//! Web server for sending and receiving shares.

pub mod assets;
pub mod routes;
pub mod templates;

pub use assets::{content_type, StaticAssets};
pub use routes::{
    attachment_disposition, build_router, download_content_type, ApiError, AppState, ErrorBody,
};
pub use templates::{human_size, FileView, ShareView, TemplateEngine, Templates};

use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener as TokioTcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::share::{Reaper, ShareDuration, ShareService, DEFAULT_REAP_INTERVAL};

/// Find an available port starting from the given base port.
///
/// Tries ports sequentially on `bind` until finding one that's available.
pub fn find_available_port(bind: IpAddr, base_port: u16) -> Option<u16> {
    (base_port..=base_port.saturating_add(100)).find(|&port| TcpListener::bind((bind, port)).is_ok())
}

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: IpAddr,
    /// Port to try first (defaults to 8000).
    pub base_port: u16,
    /// Time between reaper sweeps.
    pub reap_interval: Duration,
    /// Duration applied to uploads that don't pick one.
    pub default_duration: ShareDuration,
    /// Whether to open the sender page in a browser.
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            base_port: 8000,
            reap_interval: DEFAULT_REAP_INTERVAL,
            default_duration: ShareDuration::Manual,
            open_browser: false,
        }
    }
}

/// Run the web server and the reaper until Ctrl+C or SIGTERM.
///
/// This function will:
/// 1. Find an available port starting from `config.base_port`
/// 2. Start the reaper on `config.reap_interval`
/// 3. Serve the share routes until a shutdown signal arrives
/// 4. Stop the reaper and wait for it to finish
pub async fn run_server(shares: Arc<ShareService>, config: ServerConfig) -> anyhow::Result<()> {
    let port = find_available_port(config.bind, config.base_port)
        .ok_or_else(|| anyhow::anyhow!("No available port found"))?;
    if port != config.base_port {
        warn!(
            requested = config.base_port,
            port,
            public_base_url = %shares.public_base_url(),
            "Requested port busy, using another; set PUBLIC_BASE_URL if links point at the wrong port"
        );
    }

    let addr = SocketAddr::new(config.bind, port);
    let listener = TokioTcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reaper = Reaper::new(Arc::clone(&shares), config.reap_interval).spawn(shutdown_rx);

    let base_url = shares.public_base_url().to_string();
    let state = Arc::new(AppState::new(shares, config.default_duration));
    let app = build_router(state);

    info!(%addr, "LocalShare server listening");
    info!(public_base_url = %base_url, "All share links will use this base URL");
    println!("LocalShare running at: {}", base_url);
    println!("Press Ctrl+C to stop");

    if config.open_browser {
        let local_url = format!("http://localhost:{port}");
        if let Err(e) = webbrowser::open(&local_url) {
            warn!(error = %e, "Failed to open browser");
        }
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(());
    if let Err(e) = reaper.await {
        warn!(error = %e, "Reaper task ended abnormally");
    }
    served.context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for the shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_available_port() {
        let localhost = IpAddr::from([127, 0, 0, 1]);
        let port = find_available_port(localhost, 49152);
        assert!(port.is_some());
        assert!(port.unwrap() >= 49152);
    }

    #[test]
    fn test_find_available_port_skips_busy_port() {
        let localhost = IpAddr::from([127, 0, 0, 1]);
        let held = TcpListener::bind((localhost, 0)).unwrap();
        let busy = held.local_addr().unwrap().port();

        let port = find_available_port(localhost, busy).unwrap();
        assert_ne!(port, busy);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.base_port, 8000);
        assert_eq!(config.bind, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.reap_interval, DEFAULT_REAP_INTERVAL);
        assert_eq!(config.default_duration, ShareDuration::Manual);
        assert!(!config.open_browser);
    }
}

//! # Initialization
//!
//! Refresher startup: environment, tracing, configuration, rustls, metrics,
//! HTTP server, Kubernetes client and the reconciler context.

use crate::config::{RefresherConfig, ServerConfig};
use crate::controller::reconciler::{Reconciler, RefreshPolicy};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::provider::kubernetes::KubeCredentialWriter;
use crate::provider::oauth2::OAuth2Exchanger;
use crate::runtime::subscription::WatchSubscription;
use crate::runtime::watch_loop::LoopSettings;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Everything the watch loop needs
#[derive(Debug)]
pub struct InitializationResult {
    /// Secret watch feeding the loop
    pub subscription: WatchSubscription,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Shares the readiness flag with the probe server
    pub loop_settings: LoopSettings,
}

/// Initialize the refresher runtime
///
/// This function handles:
/// - `.env` loading
/// - Tracing subscriber setup
/// - Configuration parsing (fatal on missing or invalid values)
/// - rustls crypto provider setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup and the Secret watch
pub async fn initialize() -> Result<InitializationResult> {
    // A missing .env file is the normal case in-cluster
    let dotenv = dotenvy::dotenv();

    if let Err(e) = observability::init_tracing() {
        eprintln!("Tracing subscriber already installed: {e}");
    }
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    info!("Starting OAuth refresher");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = RefresherConfig::load().context("Invalid configuration")?;

    async move {
        // Must run before anything opens a TLS connection
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            warn!("rustls crypto provider was already installed");
        }

        observability::metrics::register_metrics()?;

        let server_state = Arc::new(ServerState::new());
        let server_state_clone = Arc::clone(&server_state);
        let server_port = config.server.metrics_port;
        let server_handle = tokio::spawn(async move {
            if let Err(e) = start_server(server_port, server_state_clone).await {
                error!("HTTP server error: {}", e);
            }
        });
        wait_for_server_ready(&server_state, &server_handle, &config.server).await?;

        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        info!(
            label_key = %config.label_key,
            refresh_interval_secs = config.refresh_interval.as_secs(),
            cooldown_secs = config.cooldown.as_secs(),
            auth_style = %config.oauth.auth_style,
            token_url = %config.oauth.token_url,
            "Refresher configured"
        );

        let exchanger = OAuth2Exchanger::new(config.oauth.clone())
            .context("Failed to build OAuth2 HTTP client")?;
        let writer = KubeCredentialWriter::new(client.clone(), config.oauth.request_timeout);
        let policy = RefreshPolicy {
            label_key: config.label_key.clone(),
            cooldown: config.cooldown,
        };
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(exchanger),
            Arc::new(writer),
            policy,
        ));

        let subscription = WatchSubscription::spawn(
            client,
            config.namespace.as_deref(),
            &config.label_key,
            config.refresh_interval,
        );

        let loop_settings = LoopSettings {
            cache_sync_timeout: config.cache_sync_timeout,
            max_concurrent_refreshes: config.max_concurrent_refreshes,
            synced: Arc::clone(&server_state.cache_synced),
        };

        info!("Refresher initialized, starting watch loop...");

        Ok(InitializationResult {
            subscription,
            reconciler,
            loop_settings,
        })
    }
    .instrument(info_span!("startup"))
    .await
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout;
    let poll_interval = server_config.poll_interval;
    let start_time = Instant::now();

    loop {
        // Server task only finishes early when binding failed
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

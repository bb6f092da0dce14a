//! # OAuth Refresher
//!
//! A Kubernetes controller that keeps OAuth2 credentials stored in Secrets fresh.
//!
//! ## Overview
//!
//! 1. **Watching Secrets** - Watches Secrets carrying the gating label across all namespaces
//! 2. **Cooldown gating** - Skips Secrets written within the cooldown window
//! 3. **Token exchange** - Exchanges the stored refresh token at the OAuth2 token endpoint
//! 4. **Write-back** - Merge-patches `access_token`, `refresh_token`, `expiry` and `updated`
//!
//! Workloads mount the Secret and never perform the refresh grant themselves.

use anyhow::Result;
use oauth_refresher::runtime::initialization::initialize;
use oauth_refresher::runtime::watch_loop::run_watch_loop;
use oauth_refresher::runtime::shutdown::shutdown_signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the controller runtime
    let init_result = initialize().await?;

    // Run the watch loop until SIGINT/SIGTERM
    run_watch_loop(
        init_result.subscription,
        init_result.reconciler,
        init_result.loop_settings,
        shutdown_signal(),
    )
    .await?;

    info!("Shutdown complete");
    Ok(())
}

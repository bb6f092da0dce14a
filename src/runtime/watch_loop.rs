//! # Watch Loop
//!
//! Single coordinator consuming the notification channel.
//!
//! 1. Wait for the watch cache to finish its initial list (bounded by the
//!    cache sync timeout). Nothing is processed before that.
//! 2. Process every cached Secret once as the initial pass.
//! 3. Dispatch notifications until shutdown, at most
//!    `max_concurrent_refreshes` at a time.
//! 4. On shutdown stop receiving, stop the watch, and wait for dispatched
//!    refreshes to finish.

use super::subscription::{Notification, WatchSubscription};
use crate::controller::reconciler::{handle_notification, Reconciler, TriggerSource};
use k8s_openapi::api::core::v1::Secret;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Watch loop settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub cache_sync_timeout: Duration,
    pub max_concurrent_refreshes: usize,
    /// Raised once the cache has synced; backs the readiness probe
    pub synced: Arc<AtomicBool>,
}

/// Failures that end the watch loop
#[derive(Debug, Error)]
pub enum WatchLoopError {
    #[error("watch cache did not sync within {0:?}")]
    CacheSyncTimeout(Duration),
    #[error("watch stopped before the cache synced")]
    WatchStopped,
}

/// Run the coordinator until `shutdown` resolves
pub async fn run_watch_loop<F>(
    mut subscription: WatchSubscription,
    ctx: Arc<Reconciler>,
    settings: LoopSettings,
    shutdown: F,
) -> Result<(), WatchLoopError>
where
    F: Future<Output = ()>,
{
    let mut shutdown = std::pin::pin!(shutdown);

    info!("Waiting for secret cache to sync...");
    let reader = subscription.reader().clone();
    let synced = tokio::select! {
        () = &mut shutdown => {
            info!("Shutdown requested before the secret cache synced");
            subscription.stop();
            return Ok(());
        }
        synced = tokio::time::timeout(settings.cache_sync_timeout, reader.wait_until_ready()) => synced,
    };
    match synced {
        Ok(Ok(())) => {}
        Ok(Err(_)) => {
            subscription.stop();
            return Err(WatchLoopError::WatchStopped);
        }
        Err(_) => {
            error!(
                "Secret cache did not sync within {}s",
                settings.cache_sync_timeout.as_secs()
            );
            subscription.stop();
            return Err(WatchLoopError::CacheSyncTimeout(settings.cache_sync_timeout));
        }
    }
    settings.synced.store(true, Ordering::Relaxed);

    let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_refreshes.max(1)));
    let mut tasks = JoinSet::new();

    let initial = reader.state();
    info!("Secret cache synced, {} secrets cached", initial.len());

    'run: {
        for secret in initial {
            let Some(permit) = acquire(&semaphore, &mut shutdown).await else {
                break 'run;
            };
            dispatch(&mut tasks, permit, secret, TriggerSource::Initial, &ctx);
        }

        loop {
            let Some(permit) = acquire(&semaphore, &mut shutdown).await else {
                break 'run;
            };
            let notification = tokio::select! {
                biased;
                () = &mut shutdown => break 'run,
                notification = subscription.recv() => notification,
            };
            let Some(Notification { secret, trigger }) = notification else {
                warn!("Notification channel closed, stopping watch loop");
                break 'run;
            };
            let secret = subscription.latest(secret);
            dispatch(&mut tasks, permit, secret, trigger, &ctx);
            reap(&mut tasks);
        }
    }

    info!("Stopping watch, waiting for {} in-flight refreshes", tasks.len());
    subscription.stop();
    while let Some(result) = tasks.join_next().await {
        log_join_result(result);
    }
    info!("Watch loop stopped");
    Ok(())
}

/// Wait for a dispatch slot, `None` once shutdown fired
async fn acquire<F>(
    semaphore: &Arc<Semaphore>,
    shutdown: &mut std::pin::Pin<&mut F>,
) -> Option<OwnedSemaphorePermit>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = shutdown.as_mut() => None,
        permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
    }
}

fn dispatch(
    tasks: &mut JoinSet<()>,
    permit: OwnedSemaphorePermit,
    secret: Arc<Secret>,
    trigger: TriggerSource,
    ctx: &Arc<Reconciler>,
) {
    let ctx = Arc::clone(ctx);
    tasks.spawn(async move {
        let outcome = handle_notification(&secret, trigger, &ctx).await;
        debug!(trigger = %trigger, "Notification handled: {:?}", outcome);
        drop(permit);
    });
}

fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Refresh task failed: {}", e);
    }
}

//! # Watch Subscription
//!
//! Live feed of labelled Secrets.
//!
//! A producer task drives the watcher through a reflector store and forwards
//! add/update events; a resync task replays the whole store every resync
//! period. Both feed one bounded channel consumed by the watch loop.
//!
//! Events of the initial list are not forwarded: the watch loop processes the
//! synced store once as the initial pass. After a relist (watch restart) the
//! relisted objects are forwarded like updates.

use crate::constants::NOTIFICATION_CHANNEL_CAPACITY;
use crate::controller::reconciler::TriggerSource;
use crate::runtime::error_policy::handle_watch_stream_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use kube_runtime::reflector::{self, ObjectRef, Store};
use kube_runtime::{watcher, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A Secret delivered to the watch loop
#[derive(Debug, Clone)]
pub struct Notification {
    pub secret: Arc<Secret>,
    pub trigger: TriggerSource,
}

/// Reflector store plus the notification channel feeding the watch loop
///
/// Dropping the subscription stops its background tasks.
pub struct WatchSubscription {
    reader: Store<Secret>,
    notifications: mpsc::Receiver<Notification>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchSubscription {
    /// Start watching Secrets that carry `label_key`
    ///
    /// `namespace` restricts the watch to one namespace, `None` watches all.
    pub fn spawn(
        client: Client,
        namespace: Option<&str>,
        label_key: &str,
        resync_interval: Duration,
    ) -> Self {
        let api: Api<Secret> = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        // Existence selector: the label value is ignored
        let config = watcher::Config::default().labels(label_key);
        let (reader, writer) = reflector::store();
        let (tx, notifications) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);

        info!(
            "Watching secrets with label {} in {}",
            label_key,
            namespace.unwrap_or("all namespaces")
        );

        let stream = watcher(api, config).default_backoff().reflect(writer);
        let producer = tokio::spawn(forward_events(stream, tx.clone()));
        let resync = tokio::spawn(resync_store(reader.clone(), tx, resync_interval));

        Self {
            reader,
            notifications,
            tasks: vec![producer, resync],
        }
    }

    /// Assemble a subscription from an existing store and channel
    pub fn from_parts(reader: Store<Secret>, notifications: mpsc::Receiver<Notification>) -> Self {
        Self {
            reader,
            notifications,
            tasks: Vec::new(),
        }
    }

    pub fn reader(&self) -> &Store<Secret> {
        &self.reader
    }

    /// Next notification, `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    /// Latest cached version of `secret`, falling back to the given copy
    pub fn latest(&self, secret: Arc<Secret>) -> Arc<Secret> {
        self.reader
            .get(&ObjectRef::from_obj(secret.as_ref()))
            .unwrap_or(secret)
    }

    /// Stop the background watch and resync tasks
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.notifications.close();
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("cached", &self.reader.len())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn forward_events<S>(stream: S, tx: mpsc::Sender<Notification>)
where
    S: futures::Stream<Item = Result<watcher::Event<Secret>, watcher::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut listed = false;

    while let Some(event) = stream.next().await {
        let secret = match event {
            Ok(watcher::Event::Apply(secret)) => secret,
            Ok(watcher::Event::InitApply(secret)) if listed => secret,
            Ok(watcher::Event::InitDone) => {
                if !listed {
                    debug!("Initial secret list complete");
                }
                listed = true;
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                handle_watch_stream_error(&e);
                continue;
            }
        };

        let notification = Notification {
            secret: Arc::new(secret),
            trigger: TriggerSource::Watch,
        };
        if tx.send(notification).await.is_err() {
            debug!("Notification receiver closed, stopping watch");
            return;
        }
    }
    warn!("Secret watch stream ended");
}

async fn resync_store(reader: Store<Secret>, tx: mpsc::Sender<Notification>, period: Duration) {
    if reader.wait_until_ready().await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial pass covers it
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let snapshot = reader.state();
        debug!("Resyncing {} secrets", snapshot.len());
        for secret in snapshot {
            let notification = Notification {
                secret,
                trigger: TriggerSource::Resync,
            };
            if tx.send(notification).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn named(name: &str, version: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("music".to_string()),
                resource_version: Some(version.to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn test_initial_list_is_not_forwarded() {
        let events = vec![
            Ok(watcher::Event::Init),
            Ok(watcher::Event::InitApply(named("listed", "1"))),
            Ok(watcher::Event::InitDone),
            Ok(watcher::Event::Apply(named("updated", "2"))),
            Ok(watcher::Event::Delete(named("deleted", "3"))),
            // Relist after a watch restart
            Ok(watcher::Event::Init),
            Ok(watcher::Event::InitApply(named("relisted", "4"))),
            Ok(watcher::Event::InitDone),
        ];
        let (tx, mut rx) = mpsc::channel(16);

        forward_events(futures::stream::iter(events), tx).await;

        let mut names = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            assert_eq!(notification.trigger, TriggerSource::Watch);
            names.push(notification.secret.metadata.name.clone().unwrap());
        }
        assert_eq!(names, vec!["updated".to_string(), "relisted".to_string()]);
    }

    #[tokio::test]
    async fn test_latest_prefers_cached_version() {
        let (reader, mut writer) = reflector::store::<Secret>();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(named("spotify", "7")));
        writer.apply_watcher_event(&watcher::Event::InitDone);
        let (_tx, rx) = mpsc::channel(1);
        let subscription = WatchSubscription::from_parts(reader, rx);

        let latest = subscription.latest(Arc::new(named("spotify", "3")));
        assert_eq!(latest.metadata.resource_version.as_deref(), Some("7"));

        let uncached = subscription.latest(Arc::new(named("deezer", "1")));
        assert_eq!(uncached.metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_replays_store_every_period() {
        let (reader, mut writer) = reflector::store::<Secret>();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(named("spotify", "1")));
        writer.apply_watcher_event(&watcher::Event::InitApply(named("deezer", "1")));
        writer.apply_watcher_event(&watcher::Event::InitDone);
        let (tx, mut rx) = mpsc::channel(16);

        let task = tokio::spawn(resync_store(reader, tx, Duration::from_secs(60)));

        // No replay at startup, the initial pass covers it
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());

        for _ in 0..2 {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let mut names = Vec::new();
            while let Ok(notification) = rx.try_recv() {
                assert_eq!(notification.trigger, TriggerSource::Resync);
                names.push(notification.secret.metadata.name.clone().unwrap());
            }
            names.sort();
            assert_eq!(names, vec!["deezer".to_string(), "spotify".to_string()]);
        }
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_waits_for_initial_list() {
        let (reader, writer) = reflector::store::<Secret>();
        let (tx, mut rx) = mpsc::channel(16);

        let task = tokio::spawn(resync_store(reader, tx, Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(rx.try_recv().is_err());

        // A writer dropped before the list completes ends the task
        drop(writer);
        task.await.unwrap();
    }
}

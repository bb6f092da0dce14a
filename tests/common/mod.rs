//! Shared fixtures for the integration tests: in-memory exchanger and writer
//! fakes plus Secret builders.

#![allow(dead_code, reason = "Each test binary uses a different subset of the fixtures")]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use oauth_refresher::controller::reconciler::{Reconciler, RefreshPolicy};
use oauth_refresher::credential::{format_timestamp, CredentialPatch, RecordKey, TokenPair};
use oauth_refresher::provider::{CredentialWriter, ExchangeError, TokenExchanger, WriteBackError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const LABEL_KEY: &str = "dj-kubelet.com/oauth-refresher";

/// What the fake token endpoint answers
#[derive(Debug, Clone)]
pub enum FakeExchange {
    /// New access token, refresh token kept unless `refresh_token` is set
    Issue {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    },
    /// New access token and a new refresh token on every call
    Rotate,
    /// Same access token as before
    Echo,
    /// Non-2xx answer
    Fail { status: u16 },
}

#[derive(Debug)]
pub struct FakeExchanger {
    exchange: FakeExchange,
    delay: Duration,
    calls: AtomicUsize,
    seen_refresh_tokens: Mutex<Vec<String>>,
    /// Notified when an exchange starts
    pub started: Notify,
}

impl FakeExchanger {
    pub fn new(exchange: FakeExchange) -> Self {
        Self {
            exchange,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
            started: Notify::new(),
        }
    }

    pub fn issuing(access_token: &str) -> Self {
        Self::new(FakeExchange::Issue {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenExchanger for FakeExchanger {
    async fn exchange(&self, current: &TokenPair) -> Result<TokenPair, ExchangeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(current.refresh_token.clone());
        self.started.notify_one();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if current.refresh_token.is_empty() {
            return Err(ExchangeError::MissingRefreshToken);
        }

        match &self.exchange {
            FakeExchange::Issue {
                access_token,
                refresh_token,
                expires_in,
            } => Ok(TokenPair::new(
                access_token.as_str(),
                refresh_token
                    .clone()
                    .unwrap_or_else(|| current.refresh_token.clone()),
                expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            )),
            FakeExchange::Rotate => Ok(TokenPair::new(
                format!("access-{call}"),
                format!("rotated-{call}"),
                Some(Utc::now() + chrono::Duration::seconds(3600)),
            )),
            FakeExchange::Echo => Ok(TokenPair::new(
                current.access_token.as_str(),
                current.refresh_token.as_str(),
                None,
            )),
            FakeExchange::Fail { status } => Err(ExchangeError::Endpoint {
                status: *status,
                error_code: Some("server_error".to_string()),
                detail: "server_error".to_string(),
            }),
        }
    }
}

/// Records patches instead of sending them
#[derive(Debug, Default)]
pub struct FakeWriter {
    patches: Mutex<Vec<(RecordKey, CredentialPatch)>>,
    fail: bool,
}

impl FakeWriter {
    pub fn failing() -> Self {
        Self {
            patches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn patches(&self) -> Vec<(RecordKey, CredentialPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialWriter for FakeWriter {
    async fn patch_credentials(
        &self,
        key: &RecordKey,
        patch: &CredentialPatch,
    ) -> Result<(), WriteBackError> {
        if self.fail {
            return Err(WriteBackError::Unavailable(format!(
                "patch of {key} rejected"
            )));
        }
        self.patches
            .lock()
            .unwrap()
            .push((key.clone(), patch.clone()));
        Ok(())
    }
}

pub fn reconciler(exchanger: &Arc<FakeExchanger>, writer: &Arc<FakeWriter>) -> Arc<Reconciler> {
    reconciler_with_policy(exchanger, writer, RefreshPolicy::default())
}

pub fn reconciler_with_policy(
    exchanger: &Arc<FakeExchanger>,
    writer: &Arc<FakeWriter>,
    policy: RefreshPolicy,
) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        Arc::clone(exchanger) as Arc<dyn TokenExchanger>,
        Arc::clone(writer) as Arc<dyn CredentialWriter>,
        policy,
    ))
}

/// Secret in `music` with the given labels and string data
pub fn secret(name: &str, labels: &[(&str, &str)], data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("music".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Secret::default()
    }
}

/// Labelled credential Secret last written `age` ago
pub fn credential_secret(name: &str, age: Duration) -> Secret {
    let updated = format_timestamp(Utc::now() - chrono::Duration::from_std(age).unwrap());
    secret(
        name,
        &[(LABEL_KEY, "spotify")],
        &[
            ("access_token", "old-access"),
            ("refresh_token", "refresh-A"),
            ("expiry", "2024-03-01T13:00:00Z"),
            ("updated", updated.as_str()),
        ],
    )
}

/// Apply a recorded patch to a Secret the way the API server folds `stringData`
pub fn apply_patch(secret: &Secret, patch: &CredentialPatch) -> Secret {
    let mut patched = secret.clone();
    let data = patched.data.get_or_insert_with(BTreeMap::new);
    for (key, value) in [
        ("access_token", &patch.access_token),
        ("refresh_token", &patch.refresh_token),
        ("expiry", &patch.expiry),
        ("updated", &patch.updated),
    ] {
        data.insert(key.to_string(), ByteString(value.as_bytes().to_vec()));
    }
    patched
}

pub fn parse(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

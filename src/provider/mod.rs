//! # Providers
//!
//! External collaborators of the refresh coordinator, each behind a trait so the
//! coordinator can be exercised with in-memory fakes.
//!
//! - [`TokenExchanger`] - OAuth2 refresh-grant exchange (`oauth2`)
//! - [`CredentialWriter`] - partial write-back of a Secret (`kubernetes`)

pub mod kubernetes;
pub mod oauth2;

use crate::credential::{CredentialPatch, RecordKey, TokenPair};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Exchanges a refresh token for a new token pair
///
/// Client credentials and endpoints are bound when the exchanger is built;
/// they are shared read-only by every call.
#[async_trait]
pub trait TokenExchanger: Send + Sync + std::fmt::Debug {
    /// Perform the refresh grant for `current`
    ///
    /// An unchanged access token is a successful outcome. The returned pair keeps
    /// `current.refresh_token` when the server does not rotate it.
    async fn exchange(&self, current: &TokenPair) -> Result<TokenPair, ExchangeError>;
}

/// Writes renewed credentials back to the store
#[async_trait]
pub trait CredentialWriter: Send + Sync + std::fmt::Debug {
    /// Merge `patch` into the record addressed by `key`, leaving other fields untouched
    async fn patch_credentials(
        &self,
        key: &RecordKey,
        patch: &CredentialPatch,
    ) -> Result<(), WriteBackError>;
}

/// Token exchange failures; none of them leave a partial result behind
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("refresh token is empty")]
    MissingRefreshToken,
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {detail}")]
    Endpoint {
        status: u16,
        /// OAuth2 `error` code when the body carried one
        error_code: Option<String>,
        detail: String,
    },
    #[error("malformed token response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
    #[error("token response has no access_token")]
    MissingAccessToken,
}

impl ExchangeError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::MissingRefreshToken => "missing_refresh_token",
            ExchangeError::Request(_) => "request",
            ExchangeError::Endpoint { .. } => "endpoint",
            ExchangeError::MalformedResponse(_) => "malformed_response",
            ExchangeError::MissingAccessToken => "missing_access_token",
        }
    }
}

/// Write-back failures; the record keeps its pre-patch state
#[derive(Debug, Error)]
pub enum WriteBackError {
    #[error("patch of secret {key} failed: {source}")]
    Kube {
        key: RecordKey,
        #[source]
        source: kube::Error,
    },
    #[error("patch of secret {key} timed out after {timeout:?}")]
    Timeout { key: RecordKey, timeout: Duration },
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

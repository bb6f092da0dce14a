//! # OAuth2 Token Exchanger
//!
//! Performs the `refresh_token` grant against the configured token endpoint.
//!
//! The request is a form-encoded POST. Client credentials are sent as HTTP Basic
//! authentication or as form parameters depending on [`AuthStyle`]; `Auto` tries
//! the header first and falls back to parameters once when the endpoint rejects
//! the request with a 4xx.

pub mod types;

use super::{ExchangeError, TokenExchanger};
use crate::config::{AuthStyle, OAuthClientConfig};
use crate::credential::TokenPair;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use tracing::{debug, warn};
use types::{ErrorResponse, TokenResponse};

/// Largest error body echoed into logs
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Refresh-grant client for one OAuth2 application
#[derive(Debug, Clone)]
pub struct OAuth2Exchanger {
    client: reqwest::Client,
    config: OAuthClientConfig,
}

impl OAuth2Exchanger {
    /// Build an exchanger with its own HTTP client, bounded by the configured request timeout
    pub fn new(config: OAuthClientConfig) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("oauth-refresher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ExchangeError::Request)?;
        Ok(Self::with_client(client, config))
    }

    /// Build an exchanger around an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: OAuthClientConfig) -> Self {
        Self { client, config }
    }

    async fn request_token(
        &self,
        refresh_token: &str,
        style: AuthStyle,
    ) -> Result<TokenResponse, ExchangeError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let mut request = self
            .client
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json");

        if style == AuthStyle::Params {
            form.push(("client_id", self.config.client_id.as_str()));
            form.push(("client_secret", self.config.client_secret.as_str()));
        } else {
            request = request.basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.as_str()),
            );
        }

        debug!(
            token_url = %self.config.token_url,
            auth_style = %style,
            "Requesting token refresh"
        );

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(ExchangeError::Request)?;
        let status = response.status();
        let body = response.text().await.map_err(ExchangeError::Request)?;

        debug!(status = status.as_u16(), "Token endpoint responded");

        if !status.is_success() {
            let (error_code, detail) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => (Some(error.error.clone()), error.summary()),
                Err(_) => (None, truncate(&body)),
            };
            return Err(ExchangeError::Endpoint {
                status: status.as_u16(),
                error_code,
                detail,
            });
        }

        serde_json::from_str(&body).map_err(ExchangeError::MalformedResponse)
    }
}

#[async_trait]
impl TokenExchanger for OAuth2Exchanger {
    async fn exchange(&self, current: &TokenPair) -> Result<TokenPair, ExchangeError> {
        if current.refresh_token.trim().is_empty() {
            return Err(ExchangeError::MissingRefreshToken);
        }

        let response = match self.config.auth_style {
            AuthStyle::Auto => {
                match self
                    .request_token(&current.refresh_token, AuthStyle::Header)
                    .await
                {
                    Err(ExchangeError::Endpoint { status, .. }) if (400..500).contains(&status) => {
                        warn!(
                            status,
                            "Token endpoint rejected header credentials, retrying with form credentials"
                        );
                        self.request_token(&current.refresh_token, AuthStyle::Params)
                            .await?
                    }
                    other => other?,
                }
            }
            style => self.request_token(&current.refresh_token, style).await?,
        };

        into_token_pair(&response, current)
    }
}

/// Validate a token response, keeping the current refresh token when the server did not rotate it
fn into_token_pair(response: &TokenResponse, current: &TokenPair) -> Result<TokenPair, ExchangeError> {
    let access_token = response
        .access_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or(ExchangeError::MissingAccessToken)?;

    let refresh_token = response
        .refresh_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .unwrap_or(current.refresh_token.as_str());

    let expiry = response
        .expires_in
        .filter(|secs| *secs > 0)
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

    Ok(TokenPair::new(access_token, refresh_token, expiry))
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let mut short: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        short.push_str("...");
        short
    }
}

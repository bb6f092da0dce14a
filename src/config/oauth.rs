//! # OAuth2 Client Configuration
//!
//! Client credentials and endpoints shared read-only by every refresh.

use reqwest::Url;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// How client credentials are presented to the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthStyle {
    /// Try HTTP Basic first, retry once with form parameters on rejection
    #[default]
    Auto,
    /// HTTP Basic authentication header
    Header,
    /// `client_id` / `client_secret` in the form body
    Params,
}

impl fmt::Display for AuthStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStyle::Auto => "auto",
            AuthStyle::Header => "header",
            AuthStyle::Params => "params",
        };
        f.write_str(name)
    }
}

/// OAuth2 client configuration
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    /// Authorization endpoint; required for completeness, the refresh grant never calls it
    pub auth_url: Url,
    pub token_url: Url,
    pub auth_style: AuthStyle,
    /// Upper bound for one token endpoint round-trip
    pub request_timeout: Duration,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("auth_style", &self.auth_style)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_client_secret() {
        let config = OAuthClientConfig {
            client_id: "client".to_string(),
            client_secret: Zeroizing::new("s3cr3t".to_string()),
            auth_url: Url::parse("https://accounts.example.com/authorize").unwrap(),
            token_url: Url::parse("https://accounts.example.com/api/token").unwrap(),
            auth_style: AuthStyle::Auto,
            request_timeout: Duration::from_secs(30),
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn test_auth_style_display() {
        assert_eq!(AuthStyle::Auto.to_string(), "auto");
        assert_eq!(AuthStyle::Header.to_string(), "header");
        assert_eq!(AuthStyle::Params.to_string(), "params");
    }
}

//! # Controller Configuration
//!
//! Process-level configuration, built once at startup and passed by reference.
//!
//! - `refresher` - flags/environment for the watch, cooldown and OAuth2 client
//! - `oauth` - OAuth2 client credentials and endpoints
//! - `server` - HTTP server settings for metrics and probes
//! - `duration` - Kubernetes-style duration parsing for interval flags
//!
//! Every flag can also be supplied through the environment. A missing required
//! credential or endpoint is a [`ConfigError`] and is fatal at startup.

mod duration;
mod oauth;
mod refresher;
mod server;

pub use duration::parse_kubernetes_duration;
pub use oauth::{AuthStyle, OAuthClientConfig};
pub use refresher::{RefresherArgs, RefresherConfig};
pub use server::ServerConfig;

use thiserror::Error;

/// Configuration errors, all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value was not supplied (or was empty)
    #[error("env {0} not set")]
    Missing(&'static str),
    /// An endpoint value is not an absolute URL
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: UrlParseError,
    },
    /// A duration flag could not be parsed
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },
    /// A numeric flag is out of range
    #[error("{name} must be {requirement}, got {value}")]
    OutOfRange {
        name: &'static str,
        requirement: &'static str,
        value: String,
    },
}

/// `url::ParseError`, reached through reqwest's `Url` re-export
pub type UrlParseError = <reqwest::Url as std::str::FromStr>::Err;

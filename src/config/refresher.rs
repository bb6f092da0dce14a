//! # Refresher Configuration
//!
//! Command-line flags (each with an environment fallback) and their validated form.
//!
//! Flags take the usual `--flag` form. Existing manifests written for Go's
//! `flag` package pass `-labelKey=...`; [`go_style_flags`] rewrites those
//! single-dash long flags before clap parses them.

use super::duration::parse_kubernetes_duration;
use super::oauth::{AuthStyle, OAuthClientConfig};
use super::server::ServerConfig;
use super::ConfigError;
use crate::constants;
use clap::{CommandFactory, Parser};
use reqwest::Url;
use std::ffi::OsString;
use std::time::Duration;
use zeroize::Zeroizing;

/// Keeps OAuth2 token pairs stored in Kubernetes Secrets fresh
#[derive(Parser, Debug, Clone)]
#[command(name = "oauth-refresher", version, about, long_about = None)]
pub struct RefresherArgs {
    /// Label key marking Secrets managed by this controller (value ignored)
    #[arg(long = "label-key", visible_alias = "labelKey", env = "LABEL_KEY", default_value = constants::DEFAULT_LABEL_KEY)]
    pub label_key: String,

    /// Forced resync period for the Secret watch (e.g. "600", "10m")
    #[arg(long = "refresh-interval", visible_alias = "refreshInterval", env = "REFRESH_INTERVAL", default_value = "600")]
    pub refresh_interval: String,

    /// Minimum time between two refreshes of the same Secret
    #[arg(long, env = "REFRESH_COOLDOWN", default_value = "60s")]
    pub cooldown: String,

    /// How long to wait for the initial Secret list
    #[arg(long, env = "CACHE_SYNC_TIMEOUT", default_value = "2m")]
    pub cache_sync_timeout: String,

    /// Timeout for each token exchange and write-back
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s")]
    pub request_timeout: String,

    /// Refreshes of distinct Secrets allowed to run concurrently
    #[arg(long, env = "MAX_CONCURRENT_REFRESHES", default_value_t = constants::DEFAULT_MAX_CONCURRENT_REFRESHES)]
    pub max_concurrent_refreshes: usize,

    /// Restrict the watch to one namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Client authentication style at the token endpoint
    #[arg(long, env = "AUTH_STYLE", value_enum, default_value_t = AuthStyle::Auto)]
    pub auth_style: AuthStyle,

    /// OAuth2 client identifier
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth2 authorization endpoint
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: Option<String>,

    /// OAuth2 token endpoint
    #[arg(long, env = "TOKEN_URL")]
    pub token_url: Option<String>,

    /// Port of the metrics and health probe server
    #[arg(long, env = "METRICS_PORT", default_value_t = constants::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// How long startup waits for the metrics server
    #[arg(long, env = "SERVER_STARTUP_TIMEOUT", default_value = "10s")]
    pub server_startup_timeout: String,

    /// Readiness poll interval while waiting for the metrics server
    #[arg(long, env = "SERVER_POLL_INTERVAL", default_value = "50ms")]
    pub server_poll_interval: String,
}

/// Validated refresher configuration
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    pub label_key: String,
    pub refresh_interval: Duration,
    pub cooldown: Duration,
    pub cache_sync_timeout: Duration,
    pub max_concurrent_refreshes: usize,
    pub namespace: Option<String>,
    pub oauth: OAuthClientConfig,
    pub server: ServerConfig,
}

impl RefresherConfig {
    /// Parse process arguments and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(RefresherArgs::parse_from(go_style_flags(std::env::args_os())))
    }

    /// Validate parsed arguments
    pub fn from_args(args: RefresherArgs) -> Result<Self, ConfigError> {
        let client_id = require(args.client_id, "CLIENT_ID")?;
        let client_secret = Zeroizing::new(require(args.client_secret, "CLIENT_SECRET")?);
        let auth_url = parse_url(require(args.auth_url, "AUTH_URL")?, "AUTH_URL")?;
        let token_url = parse_url(require(args.token_url, "TOKEN_URL")?, "TOKEN_URL")?;

        let label_key = args.label_key.trim().to_string();
        if label_key.is_empty() {
            return Err(ConfigError::Missing("LABEL_KEY"));
        }

        if args.max_concurrent_refreshes == 0 {
            return Err(ConfigError::OutOfRange {
                name: "MAX_CONCURRENT_REFRESHES",
                requirement: "at least 1",
                value: args.max_concurrent_refreshes.to_string(),
            });
        }

        let namespace = args
            .namespace
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        Ok(Self {
            label_key,
            refresh_interval: parse_kubernetes_duration(&args.refresh_interval)?,
            cooldown: parse_kubernetes_duration(&args.cooldown)?,
            cache_sync_timeout: parse_kubernetes_duration(&args.cache_sync_timeout)?,
            max_concurrent_refreshes: args.max_concurrent_refreshes,
            namespace,
            oauth: OAuthClientConfig {
                client_id,
                client_secret,
                auth_url,
                token_url,
                auth_style: args.auth_style,
                request_timeout: parse_kubernetes_duration(&args.request_timeout)?,
            },
            server: ServerConfig::new(
                args.metrics_port,
                parse_kubernetes_duration(&args.server_startup_timeout)?,
                parse_kubernetes_duration(&args.server_poll_interval)?,
            )?,
        })
    }
}

/// Rewrite single-dash long flags (`-labelKey=x`, `-refreshInterval 300`) to
/// the double-dash form
///
/// Only names of known long flags and their aliases are rewritten, so short
/// flags and values that happen to start with a dash pass through. Nothing
/// after a bare `--` is touched.
pub fn go_style_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let command = RefresherArgs::command();
    let known: Vec<&str> = command
        .get_arguments()
        .flat_map(|arg| {
            arg.get_long()
                .into_iter()
                .chain(arg.get_all_aliases().unwrap_or_default())
        })
        .collect();

    let mut rewritten = Vec::new();
    let mut literal = false;
    for arg in args {
        if literal {
            rewritten.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            rewritten.push(arg);
            continue;
        };
        if text == "--" {
            literal = true;
            rewritten.push(arg);
            continue;
        }
        let single_dash_long = text
            .strip_prefix('-')
            .filter(|rest| !rest.starts_with('-'))
            .filter(|rest| {
                let name = rest.split_once('=').map_or(*rest, |(name, _)| name);
                known.contains(&name)
            });
        let double_dash = single_dash_long.map(|rest| OsString::from(format!("--{rest}")));
        rewritten.push(double_dash.unwrap_or(arg));
    }
    rewritten
}

fn require(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_url(value: String, name: &'static str) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

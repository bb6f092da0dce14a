//! # Observability
//!
//! Prometheus metrics and tracing subscriber setup.

pub mod metrics;

use crate::constants::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default `oauth_refresher=info` filter. Calling this
/// twice is harmless; the second call reports the existing subscriber.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .finish()
        .try_init()
}

//! # Error Policy
//!
//! Classification and logging of Secret watch stream errors.
//!
//! The watcher restarts itself with exponential backoff (`default_backoff`);
//! this module only decides how loudly each failure is reported.

use crate::observability;
use kube_runtime::watcher;
use tracing::{error, warn};

/// Watch error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401/403, RBAC revoked or service account token expired
    Unauthorized,
    /// 410, resource version too old; the watcher relists
    Expired,
    /// 429, API server storage reinitializing
    TooManyRequests,
    Other,
}

impl WatchErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchErrorClass::Unauthorized => "unauthorized",
            WatchErrorClass::Expired => "expired",
            WatchErrorClass::TooManyRequests => "too_many_requests",
            WatchErrorClass::Other => "other",
        }
    }
}

/// Classify a watch error from its rendered message
pub fn classify_error_message(message: &str) -> WatchErrorClass {
    if message.contains("401")
        || message.contains("403")
        || message.contains("Unauthorized")
        || message.contains("Forbidden")
    {
        WatchErrorClass::Unauthorized
    } else if message.contains("410")
        || message.contains("too old resource version")
        || message.contains("Expired")
        || message.contains("Gone")
    {
        WatchErrorClass::Expired
    } else if message.contains("429")
        || message.contains("storage is (re)initializing")
        || message.contains("TooManyRequests")
    {
        WatchErrorClass::TooManyRequests
    } else {
        WatchErrorClass::Other
    }
}

/// Log and count a watch stream error
pub fn handle_watch_stream_error(error: &watcher::Error) -> WatchErrorClass {
    let message = error.to_string();
    let class = classify_error_message(&message);
    observability::metrics::increment_watch_errors(class.as_str());

    match class {
        WatchErrorClass::Unauthorized => {
            error!(
                error_type = class.as_str(),
                "Secret watch is not authorized, check that the service account may list and watch secrets: {}",
                message
            );
        }
        WatchErrorClass::Expired => {
            warn!(
                error_type = class.as_str(),
                "Secret watch resource version expired, relisting: {}", message
            );
        }
        WatchErrorClass::TooManyRequests => {
            warn!(
                error_type = class.as_str(),
                "API server is throttling the Secret watch, backing off: {}", message
            );
        }
        WatchErrorClass::Other => {
            error!(error_type = class.as_str(), "Secret watch stream error: {}", message);
        }
    }
    class
}

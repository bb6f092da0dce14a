//! # Constants
//!
//! Default values and well-known names shared across the controller.

/// Label key that marks a Secret as managed by the refresher (value ignored)
pub const DEFAULT_LABEL_KEY: &str = "dj-kubelet.com/oauth-refresher";

/// Forced resync period for the Secret watch (seconds)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

/// Minimum time between two writes of the same Secret (seconds)
/// Breaks the loop where our own patch re-triggers the watch
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// How long to wait for the initial Secret list before giving up (seconds)
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 120;

/// Timeout for a single token exchange or write-back (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refreshes of distinct Secrets allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_REFRESHES: usize = 1;

/// Capacity of the notification channel between watch and coordinator
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Field manager recorded on every patch
pub const FIELD_MANAGER: &str = "oauth-refresher";

// Secret data keys
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const EXPIRY_KEY: &str = "expiry";
pub const UPDATED_KEY: &str = "updated";

// First-generation key names, read but never written
pub const LEGACY_ACCESS_TOKEN_KEY: &str = "accesstoken";
pub const LEGACY_REFRESH_TOKEN_KEY: &str = "refreshtoken";

// HTTP server
pub const DEFAULT_METRICS_PORT: u16 = 5000;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "oauth_refresher=info";

//! # Server Configuration
//!
//! Metrics/probe server settings, validated from the refresher flags.

use super::ConfigError;
use std::time::Duration;

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port serving `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long startup waits for the server to accept connections
    pub startup_timeout: Duration,
    /// Readiness poll interval during startup
    pub poll_interval: Duration,
}

impl ServerConfig {
    pub fn new(
        metrics_port: u16,
        startup_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if metrics_port == 0 {
            return Err(ConfigError::OutOfRange {
                name: "METRICS_PORT",
                requirement: "between 1 and 65535",
                value: metrics_port.to_string(),
            });
        }
        if poll_interval.is_zero() || poll_interval > startup_timeout {
            return Err(ConfigError::OutOfRange {
                name: "SERVER_POLL_INTERVAL",
                requirement: "non-zero and at most SERVER_STARTUP_TIMEOUT",
                value: format!("{poll_interval:?}"),
            });
        }
        Ok(Self {
            metrics_port,
            startup_timeout,
            poll_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_zero_rejected() {
        let err = ServerConfig::new(0, Duration::from_secs(10), Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "METRICS_PORT", .. }));
    }

    #[test]
    fn test_poll_interval_bounded_by_timeout() {
        let zero = ServerConfig::new(5000, Duration::from_secs(10), Duration::ZERO);
        let longer = ServerConfig::new(5000, Duration::from_secs(1), Duration::from_secs(2));
        assert!(zero.is_err());
        assert!(longer.is_err());
    }

    #[test]
    fn test_valid_settings() {
        let config = ServerConfig::new(9090, Duration::from_secs(10), Duration::from_millis(50)).unwrap();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }
}

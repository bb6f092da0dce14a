//! # Duration Parsing
//!
//! Parses Kubernetes-style duration strings used by the interval flags.

use super::ConfigError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>ms|[smhd])?$").expect("duration regex is valid")
});

/// Parse a duration string into `std::time::Duration`
/// Supports formats: "50ms", "30s", "1m", "5m", "1h", "2h", "1d"
/// A bare number is read as seconds ("600"), as accepted by the `--refreshInterval` alias
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration, ConfigError> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration {
            value: duration_str.to_string(),
            reason: "duration string cannot be empty".to_string(),
        });
    }

    let interval_lower = duration_trimmed.to_lowercase();
    let captures = DURATION_REGEX
        .captures(&interval_lower)
        .ok_or_else(|| ConfigError::InvalidDuration {
            value: duration_trimmed.to_string(),
            reason: "expected <number><unit> (e.g. '30s', '10m', '1h') or seconds".to_string(),
        })?;

    let number: u64 = captures
        .name("number")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse()
        .map_err(|e| ConfigError::InvalidDuration {
            value: duration_trimmed.to_string(),
            reason: format!("invalid number: {e}"),
        })?;

    if number == 0 {
        return Err(ConfigError::InvalidDuration {
            value: duration_trimmed.to_string(),
            reason: "duration must be greater than 0".to_string(),
        });
    }

    let multiplier_ms = match captures.name("unit").map(|m| m.as_str()) {
        Some("ms") => 1,
        None | Some("s") => 1_000,
        Some("m") => 60_000,
        Some("h") => 3_600_000,
        Some("d") => 86_400_000,
        Some(unit) => {
            return Err(ConfigError::InvalidDuration {
                value: duration_trimmed.to_string(),
                reason: format!("invalid unit '{unit}', expected ms, s, m, h or d"),
            });
        }
    };

    let millis = number
        .checked_mul(multiplier_ms)
        .ok_or_else(|| ConfigError::InvalidDuration {
            value: duration_trimmed.to_string(),
            reason: "duration overflows".to_string(),
        })?;

    Ok(Duration::from_millis(millis))
}

//! # Credentials
//!
//! The persisted unit managed by the refresher: an OAuth2 token pair stored in a
//! labelled Kubernetes Secret, plus the patch that renews it.
//!
//! Token material is wiped on drop and never rendered by `Debug`.

mod patch;
mod record;
mod token;

pub use patch::CredentialPatch;
pub use record::{CredentialRecord, RecordError, RecordKey};
pub use token::TokenPair;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Problems reading the `updated` timestamp of a record
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("timestamp is missing")]
    Missing,
    #[error("timestamp '{value}' is not RFC3339: {source}")]
    Invalid {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse an RFC3339 timestamp as stored in Secret data
pub fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.map(str::trim).filter(|v| !v.is_empty()).ok_or(TimestampError::Missing)?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| TimestampError::Invalid {
            value: value.to_string(),
            source,
        })
}

/// Format a timestamp for Secret data
///
/// Sub-second digits are kept so consecutive writes stay strictly ordered.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_utc_and_offset() {
        let utc = parse_timestamp(Some("2024-03-01T12:00:00Z")).unwrap();
        let offset = parse_timestamp(Some("2024-03-01T13:00:00+01:00")).unwrap();
        assert_eq!(utc, offset);
    }

    #[test]
    fn test_parse_timestamp_fractional_seconds() {
        let parsed = parse_timestamp(Some("2024-03-01T12:00:00.123456789Z")).unwrap();
        assert_eq!(parsed.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn test_parse_timestamp_missing() {
        assert!(matches!(parse_timestamp(None), Err(TimestampError::Missing)));
        assert!(matches!(parse_timestamp(Some("  ")), Err(TimestampError::Missing)));
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        let err = parse_timestamp(Some("yesterday")).unwrap_err();
        assert!(matches!(err, TimestampError::Invalid { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn test_format_timestamp_parses_back() {
        let value = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        let formatted = format_timestamp(value);
        assert_eq!(formatted, "2024-03-01T12:00:00.250Z");
        assert_eq!(parse_timestamp(Some(&formatted)).unwrap(), value);
    }
}

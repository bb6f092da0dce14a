//! # Eligibility
//!
//! Decides whether an observed Secret enters the refresh pipeline.
//!
//! 1. Label gate: the gating label key must be present, its value is ignored.
//! 2. `updated` is parsed as RFC3339. A missing or unparsable value is logged and
//!    counted, and the record is treated as eligible so a freshly provisioned
//!    Secret still gets its first refresh.
//! 3. Cooldown: a record written less than `policy.cooldown` ago is skipped. Every
//!    successful refresh rewrites `updated`, which triggers the watch again; the
//!    cooldown turns that into a single extra notification.

use super::types::RefreshPolicy;
use crate::credential::{parse_timestamp, CredentialRecord};
use crate::observability;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of the eligibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Gating label absent
    Unmanaged,
    /// Written too recently
    CoolingDown { elapsed: Duration, remaining: Duration },
    /// Refresh now; `since` is `None` when `updated` was missing or unparsable
    Eligible { since: Option<Duration> },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// True when `labels` carries the gating key
pub fn has_gating_label(labels: Option<&BTreeMap<String, String>>, label_key: &str) -> bool {
    labels.is_some_and(|labels| labels.contains_key(label_key))
}

/// Evaluate a record against the policy at `now`
pub fn evaluate(record: &CredentialRecord, policy: &RefreshPolicy, now: DateTime<Utc>) -> Eligibility {
    if !has_gating_label(Some(&record.labels), &policy.label_key) {
        return Eligibility::Unmanaged;
    }

    let updated = match parse_timestamp(record.updated.as_deref()) {
        Ok(updated) => updated,
        Err(e) => {
            warn!(
                resource.namespace = %record.key.namespace,
                resource.name = %record.key.name,
                error = %e,
                "Secret {} has no usable updated timestamp, treating as stale",
                record.key
            );
            observability::metrics::increment_timestamp_parse_errors();
            return Eligibility::Eligible { since: None };
        }
    };

    // A timestamp in the future counts as just written
    let elapsed = (now - updated).to_std().unwrap_or(Duration::ZERO);

    if elapsed < policy.cooldown {
        return Eligibility::CoolingDown {
            elapsed,
            remaining: policy.cooldown - elapsed,
        };
    }

    info!(
        "Secret {} updated {}s ago.",
        record.key,
        elapsed.as_secs()
    );
    Eligibility::Eligible {
        since: Some(elapsed),
    }
}

/// Boolean form of [`evaluate`]
pub fn is_eligible(record: &CredentialRecord, policy: &RefreshPolicy, now: DateTime<Utc>) -> bool {
    evaluate(record, policy, now).is_eligible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::format_timestamp;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;

    const LABEL: &str = "dj-kubelet.com/oauth-refresher";

    fn record(labels: &[(&str, &str)], updated: Option<&str>) -> CredentialRecord {
        let mut data = BTreeMap::from([
            ("access_token".to_string(), ByteString(b"old-access".to_vec())),
            ("refresh_token".to_string(), ByteString(b"refresh-A".to_vec())),
        ]);
        if let Some(updated) = updated {
            data.insert("updated".to_string(), ByteString(updated.as_bytes().to_vec()));
        }
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("spotify".to_string()),
                namespace: Some("music".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..Secret::default()
        };
        CredentialRecord::from_secret(&secret).unwrap()
    }

    fn ago(now: DateTime<Utc>, secs: i64) -> String {
        format_timestamp(now - chrono::Duration::seconds(secs))
    }

    #[test]
    fn test_unlabelled_record_is_never_eligible() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        for updated in [None, Some(ago(now, 7200)), Some(ago(now, 5)), Some("garbage".to_string())] {
            let r = record(&[("app", "music")], updated.as_deref());
            assert_eq!(evaluate(&r, &policy, now), Eligibility::Unmanaged);
        }
    }

    #[test]
    fn test_label_value_is_ignored() {
        let now = Utc::now();
        let r = record(&[(LABEL, "")], Some(&ago(now, 7200)));
        assert!(is_eligible(&r, &RefreshPolicy::default(), now));
    }

    #[test]
    fn test_recent_record_is_cooling_down() {
        let now = Utc::now();
        let r = record(&[(LABEL, "spotify")], Some(&ago(now, 10)));
        match evaluate(&r, &RefreshPolicy::default(), now) {
            Eligibility::CoolingDown { elapsed, remaining } => {
                assert_eq!(elapsed, Duration::from_secs(10));
                assert_eq!(remaining, Duration::from_secs(50));
            }
            other => panic!("expected CoolingDown, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_record_is_eligible() {
        let now = Utc::now();
        let r = record(&[(LABEL, "spotify")], Some(&ago(now, 7200)));
        assert_eq!(
            evaluate(&r, &RefreshPolicy::default(), now),
            Eligibility::Eligible {
                since: Some(Duration::from_secs(7200))
            }
        );
    }

    #[test]
    fn test_cooldown_boundary_is_eligible() {
        let now = Utc::now();
        let r = record(&[(LABEL, "spotify")], Some(&ago(now, 60)));
        assert!(is_eligible(&r, &RefreshPolicy::default(), now));
    }

    #[test]
    fn test_missing_timestamp_is_eligible() {
        let r = record(&[(LABEL, "spotify")], None);
        assert_eq!(
            evaluate(&r, &RefreshPolicy::default(), Utc::now()),
            Eligibility::Eligible { since: None }
        );
    }

    #[test]
    fn test_malformed_timestamp_is_eligible() {
        let r = record(&[(LABEL, "spotify")], Some("last tuesday"));
        assert!(is_eligible(&r, &RefreshPolicy::default(), Utc::now()));
    }

    #[test]
    fn test_future_timestamp_is_cooling_down() {
        let now = Utc::now();
        let future = format_timestamp(now + chrono::Duration::seconds(300));
        let r = record(&[(LABEL, "spotify")], Some(&future));
        assert!(matches!(
            evaluate(&r, &RefreshPolicy::default(), now),
            Eligibility::CoolingDown { elapsed, .. } if elapsed == Duration::ZERO
        ));
    }

    #[test]
    fn test_custom_policy() {
        let now = Utc::now();
        let policy = RefreshPolicy {
            label_key: "example.com/managed".to_string(),
            cooldown: Duration::from_secs(3600),
        };
        let r = record(&[("example.com/managed", "yes")], Some(&ago(now, 1800)));
        assert!(!is_eligible(&r, &policy, now));
        let r = record(&[("example.com/managed", "yes")], Some(&ago(now, 3601)));
        assert!(is_eligible(&r, &policy, now));
    }

    #[test]
    fn test_has_gating_label() {
        let labels = BTreeMap::from([(LABEL.to_string(), "x".to_string())]);
        assert!(has_gating_label(Some(&labels), LABEL));
        assert!(!has_gating_label(Some(&labels), "other"));
        assert!(!has_gating_label(None, LABEL));
    }
}

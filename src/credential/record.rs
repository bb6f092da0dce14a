//! # Credential Record
//!
//! Decodes a Kubernetes Secret into the fields the refresher cares about.

use crate::constants::{
    ACCESS_TOKEN_KEY, EXPIRY_KEY, LEGACY_ACCESS_TOKEN_KEY, LEGACY_REFRESH_TOKEN_KEY,
    REFRESH_TOKEN_KEY, UPDATED_KEY,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::TokenPair;

/// Identity of a record: `(namespace, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A Secret that cannot be turned into a record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("secret has no name")]
    MissingName,
    #[error("secret {secret} key '{key}' is not valid UTF-8")]
    NotUtf8 {
        secret: String,
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Credential Record read from a Secret
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialRecord {
    #[zeroize(skip)]
    pub key: RecordKey,
    /// Empty when the Secret carries no access token yet
    pub access_token: String,
    /// Empty when absent; the exchange rejects an empty refresh token
    pub refresh_token: String,
    #[zeroize(skip)]
    pub expiry: Option<String>,
    /// Raw `updated` value, parsed by the eligibility filter so problems surface there
    #[zeroize(skip)]
    pub updated: Option<String>,
    #[zeroize(skip)]
    pub labels: BTreeMap<String, String>,
}

impl CredentialRecord {
    /// Decode a Secret
    ///
    /// The namespace falls back to `default` for cluster-scoped lists that omit it.
    /// Token keys fall back to the legacy `accesstoken` / `refreshtoken` names.
    pub fn from_secret(secret: &Secret) -> Result<Self, RecordError> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or(RecordError::MissingName)?;
        let namespace = secret.metadata.namespace.as_deref().unwrap_or("default");
        let key = RecordKey::new(namespace, name);

        let empty = BTreeMap::new();
        let data = secret.data.as_ref().unwrap_or(&empty);
        let read = |field: &str| -> Result<Option<String>, RecordError> {
            data.get(field)
                .map(|ByteString(bytes)| {
                    String::from_utf8(bytes.clone()).map_err(|source| RecordError::NotUtf8 {
                        secret: key.to_string(),
                        key: field.to_string(),
                        source,
                    })
                })
                .transpose()
        };

        let access_token = match read(ACCESS_TOKEN_KEY)? {
            Some(token) => token,
            None => read(LEGACY_ACCESS_TOKEN_KEY)?.unwrap_or_default(),
        };
        let refresh_token = match read(REFRESH_TOKEN_KEY)? {
            Some(token) => token,
            None => read(LEGACY_REFRESH_TOKEN_KEY)?.unwrap_or_default(),
        };
        let expiry = read(EXPIRY_KEY)?;
        let updated = read(UPDATED_KEY)?;
        let labels = secret.metadata.labels.clone().unwrap_or_default();

        Ok(Self {
            key,
            access_token,
            refresh_token,
            expiry,
            updated,
            labels,
        })
    }

    /// Stored tokens, marked expired so the exchange never trusts stored expiry
    pub fn expired_token_pair(&self) -> TokenPair {
        TokenPair::expired(self.access_token.as_str(), self.refresh_token.as_str())
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("key", &self.key)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("updated", &self.updated)
            .field("labels", &self.labels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret(data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("spotify".to_string()),
                namespace: Some("music".to_string()),
                labels: Some(BTreeMap::from([(
                    "dj-kubelet.com/oauth-refresher".to_string(),
                    "spotify".to_string(),
                )])),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    #[test]
    fn test_from_secret_reads_canonical_keys() {
        let record = CredentialRecord::from_secret(&secret(&[
            ("access_token", "old-access"),
            ("refresh_token", "refresh-A"),
            ("expiry", "2024-03-01T13:00:00Z"),
            ("updated", "2024-03-01T12:00:00Z"),
        ]))
        .unwrap();

        assert_eq!(record.key, RecordKey::new("music", "spotify"));
        assert_eq!(record.access_token, "old-access");
        assert_eq!(record.refresh_token, "refresh-A");
        assert_eq!(record.expiry.as_deref(), Some("2024-03-01T13:00:00Z"));
        assert_eq!(record.updated.as_deref(), Some("2024-03-01T12:00:00Z"));
        assert!(record.labels.contains_key("dj-kubelet.com/oauth-refresher"));
    }

    #[test]
    fn test_from_secret_falls_back_to_legacy_keys() {
        let record = CredentialRecord::from_secret(&secret(&[
            ("accesstoken", "legacy-access"),
            ("refreshtoken", "legacy-refresh"),
        ]))
        .unwrap();

        assert_eq!(record.access_token, "legacy-access");
        assert_eq!(record.refresh_token, "legacy-refresh");
        assert!(record.updated.is_none());
    }

    #[test]
    fn test_canonical_keys_win_over_legacy() {
        let record = CredentialRecord::from_secret(&secret(&[
            ("access_token", "new"),
            ("accesstoken", "old"),
        ]))
        .unwrap();
        assert_eq!(record.access_token, "new");
    }

    #[test]
    fn test_from_secret_without_data() {
        let mut s = secret(&[]);
        s.data = None;
        let record = CredentialRecord::from_secret(&s).unwrap();
        assert!(record.access_token.is_empty());
        assert!(record.refresh_token.is_empty());
    }

    #[test]
    fn test_from_secret_requires_name() {
        let mut s = secret(&[]);
        s.metadata.name = None;
        assert!(matches!(
            CredentialRecord::from_secret(&s),
            Err(RecordError::MissingName)
        ));
    }

    #[test]
    fn test_from_secret_rejects_non_utf8_token() {
        let mut s = secret(&[]);
        s.data = Some(BTreeMap::from([(
            "refresh_token".to_string(),
            ByteString(vec![0xff, 0xfe]),
        )]));
        let err = CredentialRecord::from_secret(&s).unwrap_err();
        assert!(matches!(err, RecordError::NotUtf8 { ref key, .. } if key == "refresh_token"));
    }

    #[test]
    fn test_expired_token_pair() {
        let record = CredentialRecord::from_secret(&secret(&[
            ("access_token", "a"),
            ("refresh_token", "r"),
        ]))
        .unwrap();
        let pair = record.expired_token_pair();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token, "r");
        assert!(pair.is_expired_at(chrono::Utc::now()));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let record = CredentialRecord::from_secret(&secret(&[("access_token", "top-secret")]))
            .unwrap();
        assert!(!format!("{record:?}").contains("top-secret"));
    }
}

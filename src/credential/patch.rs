//! # Credential Patch
//!
//! The field group written back after a successful exchange.
//!
//! Sent as a JSON merge patch under `stringData`, so keys not listed here
//! (and every other part of the Secret) are left untouched.

use super::{format_timestamp, TokenPair};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Renewed credential fields
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPatch {
    pub access_token: String,
    pub refresh_token: String,
    /// RFC3339, empty when the server did not advertise an expiry
    #[zeroize(skip)]
    pub expiry: String,
    #[zeroize(skip)]
    pub updated: String,
}

impl CredentialPatch {
    /// Build the patch for a freshly exchanged pair written at `updated`
    pub fn new(pair: &TokenPair, updated: DateTime<Utc>) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            expiry: pair.expiry.map(format_timestamp).unwrap_or_default(),
            updated: format_timestamp(updated),
        }
    }

    /// Merge patch body for the Secret
    pub fn to_merge_patch(&self) -> serde_json::Value {
        serde_json::json!({ "stringData": self })
    }
}

impl fmt::Debug for CredentialPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPatch")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("updated", &self.updated)
            .finish()
    }
}

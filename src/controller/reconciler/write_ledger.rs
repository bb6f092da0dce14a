//! # Write Ledger
//!
//! Last successful write-back per record, kept in memory.
//!
//! The watch cache catches up with our own patches asynchronously, so a
//! queued notification can still carry the pre-refresh copy of a Secret after
//! the in-flight guard has been released. Such a copy holds an `updated`
//! older than the one we wrote and a refresh token we already spent. Under
//! the guard, the handler overlays the ledger entry onto that copy, so the
//! cooldown sees the real last write and any further exchange uses the token
//! issued by the previous one.

use crate::credential::{
    format_timestamp, parse_timestamp, CredentialPatch, CredentialRecord, RecordKey,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use zeroize::Zeroizing;

struct LastWrite {
    updated: DateTime<Utc>,
    /// Refresh token sent in the exchange that produced `patch`
    consumed: Zeroizing<String>,
    patch: CredentialPatch,
}

impl fmt::Debug for LastWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastWrite")
            .field("updated", &self.updated)
            .field("consumed", &"<redacted>")
            .field("patch", &self.patch)
            .finish()
    }
}

/// Last write-back of every record refreshed by this process
#[derive(Debug, Clone, Default)]
pub struct WriteLedger {
    writes: Arc<Mutex<HashMap<RecordKey, LastWrite>>>,
}

impl WriteLedger {
    /// Remember a successful write of `patch` at `updated`
    pub fn remember(
        &self,
        key: &RecordKey,
        consumed_refresh_token: &str,
        patch: &CredentialPatch,
        updated: DateTime<Utc>,
    ) {
        let entry = LastWrite {
            updated,
            consumed: Zeroizing::new(consumed_refresh_token.to_string()),
            patch: patch.clone(),
        };
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), entry);
    }

    /// Replace the credential fields of `record` with our last write when the
    /// record predates it
    ///
    /// A copy predates the write when it still carries the refresh token that
    /// write consumed and its `updated` is missing or older. A record whose
    /// token was replaced by someone else is left alone. Returns true when the
    /// record was overlaid.
    pub fn overlay(&self, record: &mut CredentialRecord) -> bool {
        let writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(last) = writes.get(&record.key) else {
            return false;
        };

        if record.refresh_token != *last.consumed && record.refresh_token != last.patch.refresh_token {
            return false;
        }
        let observed_is_older = match parse_timestamp(record.updated.as_deref()) {
            Ok(observed) => observed < last.updated,
            Err(_) => true,
        };
        if !observed_is_older {
            return false;
        }

        record.access_token = last.patch.access_token.clone();
        record.refresh_token = last.patch.refresh_token.clone();
        record.expiry = Some(last.patch.expiry.clone()).filter(|e| !e.is_empty());
        record.updated = Some(format_timestamp(last.updated));
        true
    }

    pub fn len(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

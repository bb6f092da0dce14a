//! # In-Flight Guard
//!
//! Single-flight set of record keys. A key is inserted before a refresh starts
//! and removed when the returned guard drops, so two refreshes of the same
//! Secret never overlap even when the cooldown is shorter than a round-trip.

use crate::credential::RecordKey;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Keys of records currently being refreshed
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<RecordKey>>>,
}

impl InFlight {
    /// Claim `key`, or `None` when a refresh for it is already running
    pub fn try_acquire(&self, key: &RecordKey) -> Option<InFlightGuard> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.clone()).then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.clone(),
        })
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its key on drop, including when the refresh failed
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<RecordKey>>>,
    key: RecordKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let in_flight = InFlight::default();
        let key = RecordKey::new("music", "spotify");

        let guard = in_flight.try_acquire(&key);
        assert!(guard.is_some());
        assert!(in_flight.try_acquire(&key).is_none());
        assert!(in_flight.contains(&key));
    }

    #[test]
    fn test_drop_releases_key() {
        let in_flight = InFlight::default();
        let key = RecordKey::new("music", "spotify");

        drop(in_flight.try_acquire(&key));
        assert!(in_flight.is_empty());
        assert!(in_flight.try_acquire(&key).is_some());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let in_flight = InFlight::default();
        let a = in_flight.try_acquire(&RecordKey::new("music", "spotify"));
        let b = in_flight.try_acquire(&RecordKey::new("music", "deezer"));
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(in_flight.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let in_flight = InFlight::default();
        let clone = in_flight.clone();
        let key = RecordKey::new("music", "spotify");
        let _guard = in_flight.try_acquire(&key);
        assert!(clone.try_acquire(&key).is_none());
    }
}

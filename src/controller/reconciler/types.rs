//! # Reconciler Types
//!
//! Shared context, policy, trigger sources and errors of the reconciler.

use super::in_flight::InFlight;
use super::write_ledger::WriteLedger;
use crate::constants::{DEFAULT_COOLDOWN_SECS, DEFAULT_LABEL_KEY};
use crate::credential::RecordError;
use crate::provider::{CredentialWriter, ExchangeError, TokenExchanger, WriteBackError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// When a record may be refreshed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Label key that must be present on the Secret (value ignored)
    pub label_key: String,
    /// Minimum time since the last write before the record is refreshed again
    pub cooldown: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            label_key: DEFAULT_LABEL_KEY.to_string(),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// Reconciler context
///
/// Built once at startup and shared through an `Arc`; everything except the
/// in-flight set and the write ledger is read-only.
#[derive(Debug)]
pub struct Reconciler {
    pub exchanger: Arc<dyn TokenExchanger>,
    pub writer: Arc<dyn CredentialWriter>,
    pub policy: RefreshPolicy,
    pub in_flight: InFlight,
    pub written: WriteLedger,
}

impl Reconciler {
    pub fn new(
        exchanger: Arc<dyn TokenExchanger>,
        writer: Arc<dyn CredentialWriter>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            exchanger,
            writer,
            policy,
            in_flight: InFlight::default(),
            written: WriteLedger::default(),
        }
    }
}

/// Why a notification was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Records present when the watch cache first synced
    Initial,
    /// Add/update event from the watch
    Watch,
    /// Periodic forced resync
    Resync,
}

impl TriggerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Initial => "initial",
            TriggerSource::Watch => "watch",
            TriggerSource::Resync => "resync",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record failures; contained to the record, never abort the loop
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid credential record: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("write-back failed: {0}")]
    WriteBack(#[from] WriteBackError),
}

impl ReconcilerError {
    /// Stage label for metrics
    pub fn stage(&self) -> &'static str {
        match self {
            ReconcilerError::InvalidRecord(_) => "record",
            ReconcilerError::Exchange(_) => "exchange",
            ReconcilerError::WriteBack(_) => "write_back",
        }
    }
}

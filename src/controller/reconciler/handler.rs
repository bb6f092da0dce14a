//! # Notification Handler
//!
//! Entry point for every Secret notification, whatever its trigger source.
//! Runs label gate, decoding, eligibility and the single-flight guard before
//! handing the record to [`refresh_credential`]. Under the guard the record is
//! checked against the write ledger and re-evaluated when it was stale.

use super::eligibility::{evaluate, has_gating_label, Eligibility};
use super::refresh::{refresh_credential, RefreshOutcome};
use super::types::{Reconciler, ReconcilerError, TriggerSource};
use crate::credential::CredentialRecord;
use crate::observability;
use chrono::Utc;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Why a notification did not lead to a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Gating label absent
    Unmanaged,
    /// Written less than the cooldown ago
    CoolingDown { remaining: Duration },
}

impl SkipReason {
    /// Label value for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unmanaged => "unmanaged",
            SkipReason::CoolingDown { .. } => "cooldown",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unmanaged => f.write_str("unmanaged"),
            SkipReason::CoolingDown { remaining } => {
                write!(f, "cooling down for another {}s", remaining.as_secs())
            }
        }
    }
}

/// What happened to a notification
#[derive(Debug)]
pub enum NotificationOutcome {
    Refreshed(RefreshOutcome),
    Skipped(SkipReason),
    /// A refresh of the same record is already running
    AlreadyInFlight,
    /// Contained to this record; the loop carries on
    Failed(ReconcilerError),
}

impl NotificationOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, NotificationOutcome::Refreshed(_))
    }
}

/// Process one Secret notification
pub async fn handle_notification(
    secret: &Secret,
    trigger: TriggerSource,
    ctx: &Reconciler,
) -> NotificationOutcome {
    let span = info_span!(
        "notification",
        trigger = %trigger,
        resource.namespace = secret.metadata.namespace.as_deref().unwrap_or("default"),
        resource.name = secret.metadata.name.as_deref().unwrap_or(""),
    );

    async move {
        observability::metrics::increment_notifications(trigger.as_str());

        // Cheap check before decoding so unrelated Secrets never surface errors
        if !has_gating_label(secret.metadata.labels.as_ref(), &ctx.policy.label_key) {
            return skipped(SkipReason::Unmanaged);
        }

        let mut record = match CredentialRecord::from_secret(secret) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring undecodable secret: {}", e);
                let e = ReconcilerError::from(e);
                observability::metrics::increment_refresh_errors(e.stage());
                return NotificationOutcome::Failed(e);
            }
        };

        if let Some(reason) = gate(&record, ctx) {
            return skipped(reason);
        }

        let Some(_guard) = ctx.in_flight.try_acquire(&record.key) else {
            debug!("Refresh of {} already in flight", record.key);
            observability::metrics::increment_skipped("in_flight");
            return NotificationOutcome::AlreadyInFlight;
        };

        // The cache may not have seen our last write yet
        if ctx.written.overlay(&mut record) {
            debug!("Secret {} is older than our last write", record.key);
            if let Some(reason) = gate(&record, ctx) {
                return skipped(reason);
            }
        }

        observability::metrics::inc_refreshes_in_flight();
        let result = refresh_credential(&record, ctx).await;
        observability::metrics::dec_refreshes_in_flight();

        match result {
            Ok(outcome) => NotificationOutcome::Refreshed(outcome),
            Err(e) => NotificationOutcome::Failed(e),
        }
    }
    .instrument(span)
    .await
}

fn gate(record: &CredentialRecord, ctx: &Reconciler) -> Option<SkipReason> {
    match evaluate(record, &ctx.policy, Utc::now()) {
        Eligibility::Unmanaged => Some(SkipReason::Unmanaged),
        Eligibility::CoolingDown { elapsed, remaining } => {
            debug!(
                "Secret {} updated {}s ago, within cooldown",
                record.key,
                elapsed.as_secs()
            );
            Some(SkipReason::CoolingDown { remaining })
        }
        Eligibility::Eligible { .. } => None,
    }
}

fn skipped(reason: SkipReason) -> NotificationOutcome {
    observability::metrics::increment_skipped(reason.as_str());
    NotificationOutcome::Skipped(reason)
}

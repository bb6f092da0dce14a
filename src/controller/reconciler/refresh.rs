//! # Credential Refresh
//!
//! Exchanges the stored refresh token and writes the renewed pair back.
//!
//! ```text
//! Idle -> Eligible -> Exchanging -> Writing -> Idle
//! ```
//!
//! Any failure returns to `Idle` without touching the Secret. There is no
//! internal retry; the next watch event or resync is the retry.

use super::types::{Reconciler, ReconcilerError};
use crate::credential::{CredentialPatch, CredentialRecord};
use crate::observability;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{error, field, info, info_span, Instrument};

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// The endpoint returned a different access token
    pub access_token_changed: bool,
    /// The endpoint issued a new refresh token
    pub refresh_token_rotated: bool,
    /// Value written to `updated`
    pub updated: DateTime<Utc>,
    /// Value written to `expiry`
    pub expiry: Option<DateTime<Utc>>,
}

/// Refresh a single record
///
/// The exchange is unconditional: the stored pair is marked expired so a stale
/// `expiry` in the Secret never short-circuits it. A successful exchange is
/// always written back, even when the access token did not change, so
/// `updated` advances and the cooldown applies.
pub async fn refresh_credential(
    record: &CredentialRecord,
    ctx: &Reconciler,
) -> Result<RefreshOutcome, ReconcilerError> {
    let span = info_span!(
        "credential.refresh",
        resource.namespace = %record.key.namespace,
        resource.name = %record.key.name,
        operation.duration_ms = field::Empty,
        operation.success = field::Empty,
    );
    let span_clone = span.clone();
    let start = Instant::now();

    async move {
        info!("Starting refresh of: {}", record.key);

        let result = exchange_and_write(record, ctx).await;

        let elapsed = start.elapsed();
        observability::metrics::observe_refresh_duration(elapsed.as_secs_f64());
        span_clone.record("operation.duration_ms", elapsed.as_millis() as u64);
        span_clone.record("operation.success", result.is_ok());

        match &result {
            Ok(_) => observability::metrics::increment_refreshes(),
            Err(e) => {
                error!("Refresh of {} failed: {}", record.key, e);
                observability::metrics::increment_refresh_errors(e.stage());
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn exchange_and_write(
    record: &CredentialRecord,
    ctx: &Reconciler,
) -> Result<RefreshOutcome, ReconcilerError> {
    let current = record.expired_token_pair();
    let renewed = ctx.exchanger.exchange(&current).await?;

    let access_token_changed = renewed.access_token != current.access_token;
    let refresh_token_rotated = renewed.refresh_token != current.refresh_token;
    if access_token_changed {
        info!("Access token updated in {}", record.key);
        observability::metrics::increment_access_tokens_changed();
    }
    if refresh_token_rotated {
        info!("Refresh token rotated for {}", record.key);
    }

    let updated = Utc::now();
    let patch = CredentialPatch::new(&renewed, updated);
    ctx.writer.patch_credentials(&record.key, &patch).await?;
    ctx.written
        .remember(&record.key, &current.refresh_token, &patch, updated);
    info!("Patched secret {}", record.key);

    Ok(RefreshOutcome {
        access_token_changed,
        refresh_token_rotated,
        updated,
        expiry: renewed.expiry,
    })
}

//! # Refresher Metrics
//!
//! Metrics for the reconciliation loop: notifications, skips, refreshes and their failures.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge};
use std::sync::LazyLock;

// Notification metrics
static NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "oauth_refresher_notifications_total",
            "Total number of Secret notifications received, by trigger source",
        ),
        &["trigger"],
    )
    .expect("Failed to create NOTIFICATIONS_TOTAL metric - this should never happen")
});

static SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "oauth_refresher_skipped_total",
            "Total number of notifications not leading to a refresh, by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create SKIPPED_TOTAL metric - this should never happen")
});

static TIMESTAMP_PARSE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "oauth_refresher_timestamp_parse_errors_total",
        "Total number of missing or unparsable `updated` timestamps",
    )
    .expect("Failed to create TIMESTAMP_PARSE_ERRORS_TOTAL metric - this should never happen")
});

// Refresh metrics
static REFRESHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "oauth_refresher_refreshes_total",
        "Total number of successful refresh-and-patch sequences",
    )
    .expect("Failed to create REFRESHES_TOTAL metric - this should never happen")
});

static REFRESH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "oauth_refresher_refresh_errors_total",
            "Total number of failed refreshes, by stage",
        ),
        &["stage"],
    )
    .expect("Failed to create REFRESH_ERRORS_TOTAL metric - this should never happen")
});

static ACCESS_TOKENS_CHANGED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "oauth_refresher_access_tokens_changed_total",
        "Total number of exchanges that produced a different access token",
    )
    .expect("Failed to create ACCESS_TOKENS_CHANGED_TOTAL metric - this should never happen")
});

static REFRESH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "oauth_refresher_refresh_duration_seconds",
            "Duration of a refresh-and-patch sequence in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create REFRESH_DURATION metric - this should never happen")
});

static REFRESHES_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "oauth_refresher_refreshes_in_flight",
        "Current number of refreshes in progress",
    )
    .expect("Failed to create REFRESHES_IN_FLIGHT metric - this should never happen")
});

// Watch metrics
static WATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "oauth_refresher_watch_errors_total",
            "Total number of Secret watch stream errors, by class",
        ),
        &["class"],
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

/// Register refresher metrics with the registry
pub(crate) fn register_refresher_metrics() -> Result<()> {
    REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TIMESTAMP_PARSE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFRESHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFRESH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACCESS_TOKENS_CHANGED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFRESH_DURATION.clone()))?;
    REGISTRY.register(Box::new(REFRESHES_IN_FLIGHT.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;
    Ok(())
}

// Public functions for refresher metrics

pub fn increment_notifications(trigger: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_skipped(reason: &str) {
    SKIPPED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_timestamp_parse_errors() {
    TIMESTAMP_PARSE_ERRORS_TOTAL.inc();
}

pub fn increment_refreshes() {
    REFRESHES_TOTAL.inc();
}

pub fn increment_refresh_errors(stage: &str) {
    REFRESH_ERRORS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn increment_access_tokens_changed() {
    ACCESS_TOKENS_CHANGED_TOTAL.inc();
}

pub fn observe_refresh_duration(duration: f64) {
    REFRESH_DURATION.observe(duration);
}

pub fn inc_refreshes_in_flight() {
    REFRESHES_IN_FLIGHT.inc();
}

pub fn dec_refreshes_in_flight() {
    REFRESHES_IN_FLIGHT.dec();
}

pub fn increment_watch_errors(class: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[class]).inc();
}

//! # Metrics Module
//!
//! Prometheus metrics for monitoring the refresher, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and exposition
//! - `refresher_metrics` - Reconciliation loop metrics (notifications, skips, refreshes)

pub mod refresher_metrics;
pub mod registry;

pub use refresher_metrics::*;
pub use registry::*;

//! # Controller
//!
//! Refresh pipeline and the HTTP surface for metrics and probes.

pub mod reconciler;
pub mod server;

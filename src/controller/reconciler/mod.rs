//! # Reconciler
//!
//! Turns Secret notifications into token refreshes.
//!
//! ## Sub-modules
//!
//! - `types` - Shared context, policy, trigger sources and errors
//! - `eligibility` - Label gate and cooldown filter
//! - `in_flight` - Single-flight guard per record
//! - `write_ledger` - Last write-back per record, overlaid on stale copies
//! - `refresh` - Exchange and write-back of one record
//! - `handler` - Per-notification pipeline tying the above together

pub mod eligibility;
pub mod handler;
pub mod in_flight;
pub mod refresh;
pub mod types;
pub mod write_ledger;

pub use eligibility::{evaluate, has_gating_label, is_eligible, Eligibility};
pub use handler::{handle_notification, NotificationOutcome, SkipReason};
pub use in_flight::{InFlight, InFlightGuard};
pub use write_ledger::WriteLedger;
pub use refresh::{refresh_credential, RefreshOutcome};
pub use types::{Reconciler, ReconcilerError, RefreshPolicy, TriggerSource};

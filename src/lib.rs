//! OAuth Refresher Library
//!
//! Core functionality for the OAuth Refresher controller: it watches labelled
//! Kubernetes Secrets holding OAuth2 token pairs and keeps them fresh.
//! Tests are included in the module files and under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod credential;
pub mod observability;
pub mod provider;
pub mod runtime;

pub use credential::{CredentialRecord, RecordKey, TokenPair};

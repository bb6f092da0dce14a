//! # Token Pair
//!
//! An OAuth2 access/refresh token pair with its advertised expiry.

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// OAuth2 token pair
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of `access_token`, `None` when the server did not advertise one
    #[zeroize(skip)]
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expiry,
        }
    }

    /// Pair that reports itself expired, forcing an unconditional exchange
    pub fn expired(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self::new(access_token, refresh_token, Some(Utc::now()))
    }

    /// True once `now` has reached the expiry; a pair without expiry never expires on its own
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

//! Cache Entry Module
//!
//! Defines the expiring value wrapper stored for every key.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cache::Value;

// == Cache Entry ==
/// A cached value together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = never expires
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now, or never.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|ttl| current_timestamp_ms().saturating_add(duration_ms(ttl)));

        Self { value, expires_at }
    }

    /// Creates an entry that never expires.
    pub fn permanent(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Returns true if the entry carries a finite TTL.
    pub fn has_ttl(&self) -> bool {
        self.expires_at.is_some()
    }

    // == Is Expired ==
    /// Checks expiry against a caller-supplied clock reading.
    ///
    /// An entry is expired once `now >= expires_at`, so a TTL that has fully
    /// elapsed is never observed as live.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns the remaining TTL at `now_ms`.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the TTL has elapsed
    /// - `Some(remaining)` if the entry has a TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn remaining_ttl_at(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at
            .map(|expires| Duration::from_millis(expires.saturating_sub(now_ms)))
    }

    /// Returns the remaining TTL against the current time.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.remaining_ttl_at(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

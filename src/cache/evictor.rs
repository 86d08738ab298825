//! Eviction Policy Module
//!
//! Decides which entry to drop when an insert finds the cache at capacity.
//! A policy runs once per rejected insert and removes at most one live entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::keyspace::Keyspace;
use crate::cache::CacheEntry;
use crate::error::CacheError;

// == Eviction Policy ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Never evict; inserts over capacity fail.
    #[default]
    Reject,
    /// Drop the first entry of an unordered scan.
    AnyEntry,
    /// Sweep expired entries; if none were expired, drop one entry that
    /// carries a TTL. Permanent entries are never evicted.
    ExpirableFirst,
}

// == Eviction Outcome ==
/// What a single policy invocation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EvictionOutcome {
    /// Already-expired entries removed by a sweep
    pub expired: usize,
    /// The live entry removed, if any
    pub evicted: Option<String>,
}

impl EvictionOutcome {
    pub fn freed_any(&self) -> bool {
        self.expired > 0 || self.evicted.is_some()
    }
}

impl EvictionPolicy {
    pub(crate) fn evict(self, keyspace: &Keyspace) -> EvictionOutcome {
        match self {
            EvictionPolicy::Reject => EvictionOutcome::default(),
            EvictionPolicy::AnyEntry => EvictionOutcome {
                expired: 0,
                evicted: evict_first(keyspace, |_| true),
            },
            EvictionPolicy::ExpirableFirst => {
                let expired = keyspace.sweep_expired(current_timestamp_ms());
                if expired > 0 {
                    return EvictionOutcome {
                        expired,
                        evicted: None,
                    };
                }
                EvictionOutcome {
                    expired: 0,
                    evicted: evict_first(keyspace, |entry| entry.has_ttl()),
                }
            }
        }
    }
}

/// Finds a candidate in one scan, then removes it outside the scan. The
/// removal re-checks the predicate so a concurrent overwrite is respected.
fn evict_first(keyspace: &Keyspace, predicate: impl Fn(&CacheEntry) -> bool) -> Option<String> {
    let key = keyspace.find_key(&predicate)?;
    keyspace.remove_if(&key, &predicate).map(|_| key)
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "none" => Ok(EvictionPolicy::Reject),
            "any" | "any_entry" | "random" => Ok(EvictionPolicy::AnyEntry),
            "expirable_first" | "volatile" => Ok(EvictionPolicy::ExpirableFirst),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Reject => write!(f, "reject"),
            EvictionPolicy::AnyEntry => write!(f, "any_entry"),
            EvictionPolicy::ExpirableFirst => write!(f, "expirable_first"),
        }
    }
}

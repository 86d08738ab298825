//! Snapshot Codec
//!
//! Encodes cache entries into a versioned JSON snapshot and back.
//!
//! Wire layout:
//! ```text
//! {
//!   "version": 1,
//!   "saved_at": "2024-01-01T00:00:00Z",
//!   "mode": "all_keys",
//!   "entries": { "<key>": { "value": {"kind": ..., "data": ...}, "expires_at": <ms|null> } }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, Value};
use crate::error::{CacheError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

// == Snapshot Mode ==
/// Which entries a snapshot includes. Expired entries are never included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// Every live entry
    #[default]
    AllKeys,
    /// Only live entries that carry a TTL
    ExpirableOnly,
    /// Only entries without a TTL
    PermanentOnly,
}

impl SnapshotMode {
    /// Returns true if `entry` belongs in a snapshot taken at `now_ms`.
    pub fn includes(self, entry: &CacheEntry, now_ms: u64) -> bool {
        if entry.is_expired_at(now_ms) {
            return false;
        }
        match self {
            SnapshotMode::AllKeys => true,
            SnapshotMode::ExpirableOnly => entry.has_ttl(),
            SnapshotMode::PermanentOnly => !entry.has_ttl(),
        }
    }
}

impl FromStr for SnapshotMode {
    type Err = CacheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_keys" => Ok(SnapshotMode::AllKeys),
            "expirable" | "expirable_only" => Ok(SnapshotMode::ExpirableOnly),
            "permanent" | "permanent_only" => Ok(SnapshotMode::PermanentOnly),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown snapshot mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotMode::AllKeys => write!(f, "all_keys"),
            SnapshotMode::ExpirableOnly => write!(f, "expirable_only"),
            SnapshotMode::PermanentOnly => write!(f, "permanent_only"),
        }
    }
}

// == Wire Types ==
#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    mode: SnapshotMode,
    entries: &'a HashMap<String, CacheEntry>,
}

/// A decoded snapshot.
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub mode: SnapshotMode,
    pub entries: HashMap<String, CacheEntry>,
}

// == Snapshot Codec ==
/// Encoder/decoder holding the set of custom type names allowed in a
/// snapshot.
#[derive(Debug, Default)]
pub struct SnapshotCodec {
    registered: RwLock<HashSet<String>>,
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows values of custom type `type_name` to be written.
    pub fn register(&self, type_name: &str) {
        self.registered.write().insert(type_name.to_string());
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registered.read().contains(type_name)
    }

    // == Encode ==
    /// Encodes `entries` into snapshot bytes.
    ///
    /// Every value is checked before anything is serialized, so one bad
    /// value fails the whole snapshot instead of truncating it.
    pub fn encode(&self, mode: SnapshotMode, entries: &HashMap<String, CacheEntry>) -> Result<Vec<u8>> {
        {
            let registered = self.registered.read();
            for (key, entry) in entries {
                check_encodable(&entry.value, &registered)
                    .map_err(|reason| CacheError::Encoding(format!("key {}: {}", key, reason)))?;
            }
        }

        let snapshot = SnapshotOut {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            mode,
            entries,
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    // == Decode ==
    /// Decodes snapshot bytes. Entries are returned as stored, expired or not.
    pub fn decode(&self, data: &[u8]) -> Result<Snapshot> {
        let snapshot: Snapshot = serde_json::from_slice(data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::Encoding(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }
}

fn check_encodable(value: &Value, registered: &HashSet<String>) -> std::result::Result<(), String> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(format!("non-finite float {}", f)),
        Value::Custom { type_name, .. } if !registered.contains(type_name) => {
            Err(format!("custom type {} is not registered", type_name))
        }
        Value::List(items) => items
            .iter()
            .try_for_each(|item| check_encodable(item, registered)),
        _ => Ok(()),
    }
}

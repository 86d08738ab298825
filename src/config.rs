//! Configuration Module
//!
//! Holds the settings a cache instance is built from, with optional loading
//! from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{EvictionPolicy, StoreKind};
use crate::error::Result;
use crate::persistence::SnapshotMode;

/// Snapshot settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Snapshot file; `None` places it next to the executable
    pub path: Option<PathBuf>,
    /// Which entries `write_to_disk` includes
    pub mode: SnapshotMode,
    /// Write a snapshot during `close`
    pub save_on_close: bool,
    /// Load the snapshot when the cache is created
    pub load_on_open: bool,
}

/// Cache configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries, `None` = unbounded
    pub capacity: Option<usize>,
    /// What to do when an insert finds the cache full
    pub eviction_policy: EvictionPolicy,
    /// Interval of the background expiry sweep, `None` = no reaper
    pub clean_interval: Option<Duration>,
    /// Storage backend
    pub store_kind: StoreKind,
    /// Disk snapshot settings
    pub snapshot: SnapshotConfig,
}

impl CacheConfig {
    pub fn with_capacity(mut self, capacity: usize, policy: EvictionPolicy) -> Self {
        self.capacity = Some(capacity);
        self.eviction_policy = policy;
        self
    }

    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = Some(interval);
        self
    }

    pub fn with_store_kind(mut self, kind: StoreKind) -> Self {
        self.store_kind = kind;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot.path = Some(path.into());
        self
    }

    pub fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.snapshot.mode = mode;
        self
    }

    pub fn with_save_on_close(mut self, enabled: bool) -> Self {
        self.snapshot.save_on_close = enabled;
        self
    }

    pub fn with_load_on_open(mut self, enabled: bool) -> Self {
        self.snapshot.load_on_open = enabled;
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum live entries, 0 or unset = unbounded
    /// - `CACHE_EVICTION_POLICY` - `reject`, `any` or `expirable_first` (default: reject)
    /// - `CACHE_CLEAN_INTERVAL_MS` - Reaper interval, 0 or unset = disabled
    /// - `CACHE_STORE` - `locked` or `sharded` (default: locked)
    /// - `CACHE_SNAPSHOT_PATH` - Snapshot file (default: next to the executable)
    /// - `CACHE_SNAPSHOT_MODE` - `all`, `expirable` or `permanent` (default: all)
    /// - `CACHE_SAVE_ON_CLOSE` - `true`/`false` (default: false)
    /// - `CACHE_LOAD_ON_OPEN` - `true`/`false` (default: false)
    ///
    /// Numbers and booleans that fail to parse fall back to their defaults;
    /// unknown policy, store or mode names are an error.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            capacity: parse_var::<usize>("CACHE_CAPACITY").filter(|&c| c > 0),
            eviction_policy: named_var("CACHE_EVICTION_POLICY")?.unwrap_or_default(),
            clean_interval: parse_var::<u64>("CACHE_CLEAN_INTERVAL_MS")
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            store_kind: named_var("CACHE_STORE")?.unwrap_or_default(),
            snapshot: SnapshotConfig {
                path: env::var("CACHE_SNAPSHOT_PATH").ok().map(PathBuf::from),
                mode: named_var("CACHE_SNAPSHOT_MODE")?.unwrap_or_default(),
                save_on_close: parse_var("CACHE_SAVE_ON_CLOSE").unwrap_or(false),
                load_on_open: parse_var("CACHE_LOAD_ON_OPEN").unwrap_or(false),
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn named_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr<Err = crate::error::CacheError>,
{
    env::var(name).ok().map(|v| v.parse()).transpose()
}

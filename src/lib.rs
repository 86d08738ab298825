//! ttl_cache - An in-process concurrent key-value cache
//!
//! Provides per-entry TTL expiration (lazy on read and by a background
//! reaper), an optional capacity bound with a selectable eviction policy,
//! and point-in-time snapshots to local disk.
//!
//! ```no_run
//! use std::time::Duration;
//! use ttl_cache::{Cache, CacheConfig, EvictionPolicy};
//!
//! # async fn run() -> ttl_cache::Result<()> {
//! let cache = Cache::new(
//!     CacheConfig::default()
//!         .with_capacity(10_000, EvictionPolicy::ExpirableFirst)
//!         .with_clean_interval(Duration::from_secs(60)),
//! )?;
//!
//! cache.set("greeting", "hello")?;
//! cache.set_with_expire("session", 42, Some(Duration::from_secs(30)))?;
//! assert_eq!(cache.get("greeting").and_then(|v| v.as_str().map(String::from)), Some("hello".into()));
//!
//! cache.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod persistence;
pub mod tasks;

pub use cache::{Cache, CacheStats, CustomType, EvictionPolicy, StoreKind, Value};
pub use config::{CacheConfig, SnapshotConfig};
pub use error::{CacheError, Result};
pub use persistence::SnapshotMode;

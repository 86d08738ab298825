//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, capacity eviction and
//! pluggable storage backends.

mod engine;
mod entry;
mod evictor;
mod keyspace;
mod stats;
mod store;
mod value;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::Cache;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use evictor::EvictionPolicy;
pub use stats::CacheStats;
pub use store::{LockedStore, ShardedStore, Store, StoreKind};
pub use value::{CustomType, Value};

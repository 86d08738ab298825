//! Cache Engine Module
//!
//! The public cache: combines a keyspace with capacity enforcement, lazy and
//! active TTL expiration, statistics and disk snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::keyspace::Keyspace;
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, CustomType, Value};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::persistence::{SnapshotCodec, SnapshotFile, SnapshotMode};
use crate::tasks::{Reaper, Sweep};

// == Cache ==
/// A concurrent key-value cache with per-entry TTL.
///
/// `Cache` is a cheap handle; clones share the same contents. All operations
/// take `&self` and may be called from any thread.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: CacheConfig,
    /// Current generation; `None` once closed.
    keyspace: RwLock<Option<Arc<Keyspace>>>,
    stats: StatsRecorder,
    codec: SnapshotCodec,
    snapshot_file: SnapshotFile,
    reaper: Mutex<Option<Reaper>>,
}

impl CacheInner {
    fn keyspace(&self) -> Option<Arc<Keyspace>> {
        self.keyspace.read().clone()
    }
}

impl Sweep for CacheInner {
    fn sweep_expired(&self) -> usize {
        let Some(keyspace) = self.keyspace() else {
            return 0;
        };
        let removed = keyspace.sweep_expired(current_timestamp_ms());
        self.stats.record_expirations(removed);
        removed
    }
}

impl Cache {
    // == Constructor ==
    /// Creates a cache from `config`.
    ///
    /// Loads the snapshot first when `snapshot.load_on_open` is set, then
    /// starts the expiry reaper when a non-zero `clean_interval` is set. The
    /// reaper needs a running tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let snapshot_file = SnapshotFile::resolve(config.snapshot.path.as_deref())?;
        let keyspace = Arc::new(Keyspace::new(config.store_kind));

        info!(
            "Creating cache: store={}, capacity={:?}, eviction={}, clean_interval={:?}",
            config.store_kind, config.capacity, config.eviction_policy, config.clean_interval
        );

        let inner = Arc::new(CacheInner {
            config,
            keyspace: RwLock::new(Some(keyspace)),
            stats: StatsRecorder::default(),
            codec: SnapshotCodec::new(),
            snapshot_file,
            reaper: Mutex::new(None),
        });
        let cache = Self { inner };

        if cache.inner.config.snapshot.load_on_open {
            cache.load_from_disk()?;
        }

        if let Some(interval) = cache.inner.config.clean_interval.filter(|i| !i.is_zero()) {
            let reaper = Reaper::spawn(Arc::downgrade(&cache.inner), interval)?;
            *cache.inner.reaper.lock() = Some(reaper);
        }

        Ok(cache)
    }

    // == Set ==
    /// Stores a permanent value. Any previous value and TTL are replaced.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.set_with_expire(key, value, None)
    }

    /// Stores a value expiring after `ttl` (`None` = never). Any previous
    /// value and TTL are replaced.
    ///
    /// Inserting a new key into a full cache runs the eviction policy once;
    /// if that frees nothing the call fails with
    /// [`CacheError::CapacityExceeded`] and the cache is unchanged. A zero
    /// TTL removes the key instead of storing it.
    pub fn set_with_expire(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = key.into();
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;

        if ttl.is_some_and(|t| t.is_zero()) {
            keyspace.remove(&key);
            return Ok(());
        }

        self.ensure_capacity(&keyspace, &key)?;
        keyspace.insert(key, CacheEntry::new(value.into(), ttl));
        Ok(())
    }

    // == Add ==
    /// Stores a permanent value only if `key` has no live entry.
    pub fn add(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.add_with_expire(key, value, None)
    }

    /// Stores a value only if `key` has no live entry, else fails with
    /// [`CacheError::KeyAlreadyExists`]. An expired entry counts as absent.
    pub fn add_with_expire(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = key.into();
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;
        let entry = CacheEntry::new(value.into(), ttl);

        loop {
            let now = current_timestamp_ms();
            match keyspace.load(&key) {
                Some(existing) if !existing.is_expired_at(now) => {
                    return Err(CacheError::KeyAlreadyExists(key));
                }
                Some(_) => {
                    self.expire_one(&keyspace, &key, now);
                }
                None => {}
            }

            if entry.is_expired_at(now) {
                return Ok(());
            }
            self.ensure_capacity(&keyspace, &key)?;

            let (existing, present) = keyspace.insert_if_absent(key.clone(), entry.clone());
            if !present {
                return Ok(());
            }
            if !existing.is_expired_at(current_timestamp_ms()) {
                return Err(CacheError::KeyAlreadyExists(key));
            }
        }
    }

    // == Replace ==
    /// Replaces the value of a live key with a permanent one.
    pub fn replace(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.replace_with_expire(key, value, None)
    }

    /// Replaces the value and TTL of a live key, else fails with
    /// [`CacheError::NotFound`]. A zero TTL removes the key.
    pub fn replace_with_expire(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = key.into();
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;

        let now = current_timestamp_ms();
        match keyspace.load(&key) {
            Some(existing) if !existing.is_expired_at(now) => {}
            Some(_) => {
                self.expire_one(&keyspace, &key, now);
                return Err(CacheError::NotFound(key));
            }
            None => return Err(CacheError::NotFound(key)),
        }

        if ttl.is_some_and(|t| t.is_zero()) {
            keyspace.remove(&key);
        } else {
            keyspace.insert(key, CacheEntry::new(value.into(), ttl));
        }
        Ok(())
    }

    // == Get ==
    /// Returns the value of a live key. An expired entry is removed.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_with_expire(key).map(|(value, _)| value)
    }

    /// Returns the value of a live key with its remaining TTL
    /// (`None` = never expires).
    pub fn get_with_expire(&self, key: &str) -> Option<(Value, Option<Duration>)> {
        let keyspace = self.inner.keyspace()?;
        let now = current_timestamp_ms();

        let Some(entry) = keyspace.load(key) else {
            self.inner.stats.record_miss();
            return None;
        };

        if entry.is_expired_at(now) {
            self.expire_one(&keyspace, key, now);
            self.inner.stats.record_miss();
            return None;
        }

        self.inner.stats.record_hit();
        let ttl = entry.remaining_ttl_at(now);
        Some((entry.value, ttl))
    }

    /// Returns true if `key` has a live entry. Does not touch hit/miss
    /// counters.
    pub fn exists(&self, key: &str) -> bool {
        let Some(keyspace) = self.inner.keyspace() else {
            return false;
        };
        let now = current_timestamp_ms();
        match keyspace.load(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.expire_one(&keyspace, key, now);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Delete ==
    /// Removes `key`. Returns true if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner
            .keyspace()
            .is_some_and(|keyspace| keyspace.remove(key).is_some())
    }

    // == Keys ==
    /// Returns the live keys starting with `prefix`, in no particular order.
    /// An empty prefix matches every key.
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        match self.inner.keyspace() {
            Some(keyspace) => keyspace.live_keys(prefix, current_timestamp_ms()),
            None => Vec::new(),
        }
    }

    // == Size ==
    /// Returns the number of entries, including expired entries that have
    /// not been removed yet.
    pub fn size(&self) -> usize {
        self.inner.keyspace().map_or(0, |keyspace| keyspace.size())
    }

    // == Flush All ==
    /// Drops every entry by swapping in an empty keyspace. Operations that
    /// already hold the previous keyspace finish against it.
    pub fn flush_all(&self) {
        let mut slot = self.inner.keyspace.write();
        if slot.is_some() {
            *slot = Some(Arc::new(Keyspace::new(self.inner.config.store_kind)));
            drop(slot);
            info!("Cache flushed");
        }
    }

    // == Sweep ==
    /// Runs one active expiry sweep and returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    // == Stats ==
    /// Returns the current hit/miss/eviction/expiration counters and size.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.size())
    }

    /// Returns true once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.inner.keyspace.read().is_none()
    }

    // == Type Registration ==
    /// Allows values of custom type `T` to be written to snapshots.
    pub fn register_value_type<T: CustomType>(&self) {
        self.inner.codec.register(T::TYPE_NAME);
        debug!("Registered snapshot value type {}", T::TYPE_NAME);
    }

    // == Persistence ==
    /// Writes a snapshot using the configured mode. Returns the number of
    /// entries written.
    pub fn write_to_disk(&self) -> Result<usize> {
        self.write_to_disk_with_mode(self.inner.config.snapshot.mode)
    }

    /// Writes a snapshot of the entries selected by `mode`. The live cache is
    /// not modified. On failure any previous snapshot is left in place unless
    /// the failure happened while writing the new file.
    pub fn write_to_disk_with_mode(&self, mode: SnapshotMode) -> Result<usize> {
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;
        self.write_snapshot(&keyspace, mode)
    }

    /// Writes a permanent-only snapshot, then removes every entry that
    /// carries a TTL from the live cache. Returns the number of entries
    /// written.
    pub fn save_permanent_and_prune(&self) -> Result<usize> {
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;
        let written = self.write_snapshot(&keyspace, SnapshotMode::PermanentOnly)?;

        let mut expirable = Vec::new();
        keyspace.range(&mut |key, entry| {
            if entry.has_ttl() {
                expirable.push(key.to_string());
            }
            true
        });
        let pruned = expirable
            .iter()
            .filter(|key| keyspace.remove_if(key, &|entry| entry.has_ttl()).is_some())
            .count();

        info!("Pruned {} expirable entries after snapshot", pruned);
        Ok(written)
    }

    /// Loads the snapshot into the cache. Entries already expired are
    /// skipped; the rest keep their original expiry. A missing snapshot file
    /// loads nothing. Returns the number of entries loaded.
    pub fn load_from_disk(&self) -> Result<usize> {
        let keyspace = self.inner.keyspace().ok_or(CacheError::Closed)?;

        let Some(data) = self.inner.snapshot_file.read()? else {
            debug!(
                "No snapshot at {}, nothing to load",
                self.inner.snapshot_file.path().display()
            );
            return Ok(0);
        };
        info!(
            "Loading snapshot: {:.2} KB from {}",
            data.len() as f64 / 1024.0,
            self.inner.snapshot_file.path().display()
        );

        let snapshot = self.inner.codec.decode(&data)?;
        let now = current_timestamp_ms();
        let total = snapshot.entries.len();
        let mut loaded = 0;
        for (key, entry) in snapshot.entries {
            if entry.is_expired_at(now) {
                continue;
            }
            keyspace.insert(key, entry);
            loaded += 1;
        }

        info!(
            "Loaded {} of {} entries from snapshot saved at {}",
            loaded, total, snapshot.saved_at
        );
        Ok(loaded)
    }

    // == Close ==
    /// Stops the reaper, writes a snapshot if `snapshot.save_on_close` is
    /// set, and releases the store. Later mutations fail with
    /// [`CacheError::Closed`]; reads find nothing. Closing twice is a no-op.
    ///
    /// The store is released even if the snapshot write fails; the write
    /// error is returned.
    pub async fn close(&self) -> Result<()> {
        let reaper = self.inner.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }

        let Some(keyspace) = self.inner.keyspace.write().take() else {
            return Ok(());
        };

        let saved = if self.inner.config.snapshot.save_on_close {
            self.write_snapshot(&keyspace, self.inner.config.snapshot.mode)
                .map(|_| ())
        } else {
            Ok(())
        };

        keyspace.clear();
        info!("Cache closed");
        saved
    }

    // == Internals ==
    /// Lazy expiry: removes `key` if it is still expired and counts it.
    fn expire_one(&self, keyspace: &Keyspace, key: &str, now: u64) {
        if keyspace.remove_expired(key, now) {
            self.inner.stats.record_expirations(1);
        }
    }

    /// Makes room for `key` if the cache is full. Overwriting a present key
    /// never needs room.
    fn ensure_capacity(&self, keyspace: &Keyspace, key: &str) -> Result<()> {
        let Some(capacity) = self.inner.config.capacity else {
            return Ok(());
        };
        if keyspace.size() < capacity || keyspace.contains(key) {
            return Ok(());
        }

        let policy = self.inner.config.eviction_policy;
        let outcome = policy.evict(keyspace);
        self.inner.stats.record_expirations(outcome.expired);
        if let Some(evicted) = &outcome.evicted {
            self.inner.stats.record_eviction();
            debug!("Evicted key {} ({})", evicted, policy);
        }

        let size = keyspace.size();
        if size >= capacity {
            warn!(
                "Rejecting insert of {}: {} of {} entries in use, policy {} freed {}",
                key,
                size,
                capacity,
                policy,
                if outcome.freed_any() { "too little" } else { "nothing" }
            );
            return Err(CacheError::CapacityExceeded(format!(
                "{} of {} entries in use",
                size, capacity
            )));
        }
        Ok(())
    }

    /// Encodes one scan of `keyspace` and writes it to the snapshot file.
    fn write_snapshot(&self, keyspace: &Keyspace, mode: SnapshotMode) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut entries = HashMap::with_capacity(keyspace.size());
        keyspace.consistent_range(&mut |key, entry| {
            if mode.includes(entry, now) {
                entries.insert(key.to_string(), entry.clone());
            }
            true
        });

        info!("Writing snapshot: {} keys, mode {}", entries.len(), mode);
        let data = self.inner.codec.encode(mode, &entries)?;
        self.inner.snapshot_file.write(&data)?;
        info!(
            "Snapshot written: {:.2} KB to {}",
            data.len() as f64 / 1024.0,
            self.inner.snapshot_file.path().display()
        );
        Ok(entries.len())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("size", &self.size())
            .field("closed", &self.is_closed())
            .field("config", &self.inner.config)
            .finish()
    }
}

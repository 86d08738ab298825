//! Keyspace Module
//!
//! One generation of cache contents: a store plus its live-entry counter.
//! `flush_all` replaces the whole generation, so a removal that lands on a
//! retired generation can never disturb the counter of the current one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{CacheEntry, Store, StoreKind};

// == Keyspace ==
pub(crate) struct Keyspace {
    store: Arc<dyn Store<CacheEntry>>,
    /// Updated outside the store's critical section; may lag briefly.
    live: AtomicI64,
    /// Mutations hold this shared; `consistent_range` holds it exclusively
    /// so a scan never interleaves with writes on any shard.
    gate: RwLock<()>,
}

impl Keyspace {
    pub fn new(kind: StoreKind) -> Self {
        Self {
            store: kind.build(),
            live: AtomicI64::new(0),
            gate: RwLock::new(()),
        }
    }

    /// Live-entry count, never negative.
    pub fn size(&self) -> usize {
        usize::try_from(self.live.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        self.store.load(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.exists(key)
    }

    /// Upserts `entry`. Returns true when the key was new.
    pub fn insert(&self, key: String, entry: CacheEntry) -> bool {
        let _gate = self.gate.read();
        let added = self.store.store(key, entry).is_none();
        if added {
            self.live.fetch_add(1, Ordering::AcqRel);
        }
        added
    }

    /// Inserts only if absent. Returns the stored entry and whether it was
    /// already present.
    pub fn insert_if_absent(&self, key: String, entry: CacheEntry) -> (CacheEntry, bool) {
        let _gate = self.gate.read();
        let (actual, present) = self.store.load_or_store(key, entry);
        if !present {
            self.live.fetch_add(1, Ordering::AcqRel);
        }
        (actual, present)
    }

    // == Removal ==
    // Every removal path ends here: the store removes atomically and the
    // counter is decremented only by the caller that won the removal.

    /// Removes `key` if present.
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.remove_if(key, &|_| true)
    }

    /// Removes `key` if its current entry satisfies `predicate`.
    pub fn remove_if(&self, key: &str, predicate: &dyn Fn(&CacheEntry) -> bool) -> Option<CacheEntry> {
        let _gate = self.gate.read();
        let removed = self.store.remove_if(key, predicate);
        if removed.is_some() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Removes `key` only if it is still expired at `now_ms`. A concurrent
    /// re-set with a fresh entry is left alone.
    pub fn remove_expired(&self, key: &str, now_ms: u64) -> bool {
        self.remove_if(key, &|entry| entry.is_expired_at(now_ms))
            .is_some()
    }

    // == Scans ==
    /// Visits entries until the visitor returns `false`.
    pub fn range(&self, visit: &mut dyn FnMut(&str, &CacheEntry) -> bool) {
        self.store.range(visit);
    }

    /// Visits entries with every mutation held off, so the visitor sees a
    /// state the keyspace was actually in. The visitor must not mutate this
    /// keyspace.
    pub fn consistent_range(&self, visit: &mut dyn FnMut(&str, &CacheEntry) -> bool) {
        let _gate = self.gate.write();
        self.store.range(visit);
    }

    /// Returns the first key, in scan order, whose entry satisfies `predicate`.
    pub fn find_key(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Option<String> {
        let mut found = None;
        self.store.range(&mut |key, entry| {
            if predicate(entry) {
                found = Some(key.to_string());
                return false;
            }
            true
        });
        found
    }

    /// Collects expired keys in one pass, then removes them in a second.
    /// Returns how many entries this call removed.
    pub fn sweep_expired(&self, now_ms: u64) -> usize {
        let mut expired = Vec::new();
        self.store.range(&mut |key, entry| {
            if entry.is_expired_at(now_ms) {
                expired.push(key.to_string());
            }
            true
        });

        expired
            .iter()
            .filter(|key| self.remove_expired(key, now_ms))
            .count()
    }

    /// Non-expired keys starting with `prefix`.
    pub fn live_keys(&self, prefix: &str, now_ms: u64) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.size());
        self.store.range(&mut |key, entry| {
            if key.starts_with(prefix) && !entry.is_expired_at(now_ms) {
                keys.push(key.to_string());
            }
            true
        });
        keys
    }

    /// Drops all contents of a retired generation.
    pub fn clear(&self) {
        let _gate = self.gate.write();
        self.store.flush();
        self.live.store(0, Ordering::Release);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Value;
    use std::thread;

    fn entry(expires_at: Option<u64>) -> CacheEntry {
        CacheEntry {
            value: Value::Null,
            expires_at,
        }
    }

    #[test]
    fn test_insert_counts_new_keys_only() {
        let keyspace = Keyspace::new(StoreKind::Locked);

        assert!(keyspace.insert("a".to_string(), entry(None)));
        assert!(!keyspace.insert("a".to_string(), entry(None)));
        assert!(keyspace.insert("b".to_string(), entry(None)));

        assert_eq!(keyspace.size(), 2);
    }

    #[test]
    fn test_insert_if_absent() {
        let keyspace = Keyspace::new(StoreKind::Sharded);

        let (_, present) = keyspace.insert_if_absent("a".to_string(), entry(None));
        assert!(!present);
        let (actual, present) = keyspace.insert_if_absent("a".to_string(), entry(Some(9)));
        assert!(present);
        assert_eq!(actual.expires_at, None);
        assert_eq!(keyspace.size(), 1);
    }

    #[test]
    fn test_remove_expired_spares_fresh_entry() {
        let keyspace = Keyspace::new(StoreKind::Locked);
        keyspace.insert("a".to_string(), entry(Some(2_000)));

        assert!(!keyspace.remove_expired("a", 1_000));
        assert!(keyspace.remove_expired("a", 2_000));
        assert!(!keyspace.remove_expired("a", 2_000));
        assert_eq!(keyspace.size(), 0);
    }

    #[test]
    fn test_sweep_expired() {
        let keyspace = Keyspace::new(StoreKind::Sharded);
        keyspace.insert("old".to_string(), entry(Some(10)));
        keyspace.insert("older".to_string(), entry(Some(5)));
        keyspace.insert("fresh".to_string(), entry(Some(1_000)));
        keyspace.insert("forever".to_string(), entry(None));

        assert_eq!(keyspace.sweep_expired(100), 2);
        assert_eq!(keyspace.size(), 2);
        assert!(keyspace.contains("fresh"));
        assert!(keyspace.contains("forever"));
    }

    #[test]
    fn test_live_keys_prefix() {
        let keyspace = Keyspace::new(StoreKind::Locked);
        keyspace.insert("user:1".to_string(), entry(None));
        keyspace.insert("user:2".to_string(), entry(Some(10)));
        keyspace.insert("post:1".to_string(), entry(None));

        let mut keys = keyspace.live_keys("user:", 100);
        keys.sort();
        assert_eq!(keys, vec!["user:1".to_string()]);
        assert_eq!(keyspace.live_keys("", 0).len(), 3);
    }

    #[test]
    fn test_concurrent_removal_decrements_once() {
        for kind in [StoreKind::Locked, StoreKind::Sharded] {
            let keyspace = Keyspace::new(kind);
            for i in 0..100 {
                keyspace.insert(format!("k{}", i), entry(Some(1)));
            }
            keyspace.insert("keep".to_string(), entry(None));

            thread::scope(|scope| {
                scope.spawn(|| keyspace.sweep_expired(50));
                scope.spawn(|| keyspace.sweep_expired(50));
                scope.spawn(|| {
                    for i in 0..100 {
                        keyspace.remove_expired(&format!("k{}", i), 50);
                    }
                });
            });

            assert_eq!(keyspace.size(), 1, "{kind}");
        }
    }

    #[test]
    fn test_consistent_range_never_sees_a_half_moved_key() {
        let keyspace = Keyspace::new(StoreKind::Sharded);
        keyspace.insert("tok0".to_string(), entry(None));
        let done = std::sync::atomic::AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..5_000 {
                    keyspace.insert(format!("tok{}", i + 1), entry(None));
                    keyspace.remove(&format!("tok{}", i));
                }
                done.store(true, Ordering::Release);
            });

            while !done.load(Ordering::Acquire) {
                let mut seen = 0;
                keyspace.consistent_range(&mut |_, _| {
                    seen += 1;
                    true
                });
                assert!(
                    (1..=2).contains(&seen),
                    "scan saw {} keys, the keyspace always holds one or two",
                    seen
                );
            }
        });
    }

    #[test]
    fn test_clear() {
        let keyspace = Keyspace::new(StoreKind::Locked);
        keyspace.insert("a".to_string(), entry(None));

        keyspace.clear();

        assert_eq!(keyspace.size(), 0);
        assert!(!keyspace.contains("a"));
    }
}

//! Cache Store Module
//!
//! Synchronized key-value maps backing the cache engine. The store knows
//! nothing about expiry or capacity; it only guarantees that each operation
//! is atomic with respect to a single key.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Store Trait ==
/// A synchronized `String -> V` map with an exact size.
///
/// `range` is weakly consistent: mutations made by other threads while a
/// scan is running may or may not be observed. The visitor must not call back
/// into the same store; collect keys first and mutate afterwards.
pub trait Store<V>: Send + Sync {
    /// Returns a clone of the value stored under `key`.
    fn load(&self, key: &str) -> Option<V>;

    /// Unconditional upsert. Returns the previous value, if any.
    fn store(&self, key: String, value: V) -> Option<V>;

    /// Removes `key`, returning the removed value.
    fn delete(&self, key: &str) -> Option<V>;

    /// Removes `key` only if its current value satisfies `predicate`, as a
    /// single atomic step.
    fn remove_if(&self, key: &str, predicate: &dyn Fn(&V) -> bool) -> Option<V>;

    /// Inserts `value` unless `key` is present. Returns the value now stored
    /// and whether it was already there.
    fn load_or_store(&self, key: String, value: V) -> (V, bool);

    fn exists(&self, key: &str) -> bool;

    /// Visits entries until the visitor returns `false`.
    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool);

    /// Drops every entry.
    fn flush(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Store Kind ==
/// Selects the backend used for a cache instance.
///
/// - `Locked`: one reader/writer lock over a plain map. Best for
///   write-heavy workloads and the lowest memory per entry.
/// - `Sharded`: a sharded concurrent map. Reads rarely contend, which pays
///   off on many cores, at roughly twice the memory per entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Locked,
    Sharded,
}

impl StoreKind {
    /// Builds an empty store of this kind.
    pub fn build<V>(self) -> Arc<dyn Store<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        match self {
            StoreKind::Locked => Arc::new(LockedStore::new()),
            StoreKind::Sharded => Arc::new(ShardedStore::new()),
        }
    }
}

impl FromStr for StoreKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locked" | "rwlock" => Ok(StoreKind::Locked),
            "sharded" | "dashmap" => Ok(StoreKind::Sharded),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown store kind: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Locked => write!(f, "locked"),
            StoreKind::Sharded => write!(f, "sharded"),
        }
    }
}

// == Locked Store ==
/// A `HashMap` behind a single `RwLock`.
#[derive(Debug, Default)]
pub struct LockedStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> LockedStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Store<V> for LockedStore<V>
where
    V: Clone + Send + Sync,
{
    fn load(&self, key: &str) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    fn store(&self, key: String, value: V) -> Option<V> {
        self.entries.write().insert(key, value)
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.entries.write().remove(key)
    }

    fn remove_if(&self, key: &str, predicate: &dyn Fn(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(value) if predicate(value) => entries.remove(key),
            _ => None,
        }
    }

    fn load_or_store(&self, key: String, value: V) -> (V, bool) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            return (existing.clone(), true);
        }
        entries.insert(key, value.clone());
        (value, false)
    }

    fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) {
        let entries = self.entries.read();
        for (key, value) in entries.iter() {
            if !visit(key, value) {
                break;
            }
        }
    }

    fn flush(&self) {
        *self.entries.write() = HashMap::new();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

// == Sharded Store ==
/// A `DashMap`; each shard carries its own lock.
#[derive(Debug, Default)]
pub struct ShardedStore<V> {
    entries: DashMap<String, V>,
}

impl<V> ShardedStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Store<V> for ShardedStore<V>
where
    V: Clone + Send + Sync,
{
    fn load(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn store(&self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn remove_if(&self, key: &str, predicate: &dyn Fn(&V) -> bool) -> Option<V> {
        self.entries
            .remove_if(key, |_, value| predicate(value))
            .map(|(_, value)| value)
    }

    fn load_or_store(&self, key: String, value: V) -> (V, bool) {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => (occupied.get().clone(), true),
            Entry::Vacant(vacant) => {
                vacant.insert(value.clone());
                (value, false)
            }
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) {
        for item in self.entries.iter() {
            if !visit(item.key(), item.value()) {
                break;
            }
        }
    }

    fn flush(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

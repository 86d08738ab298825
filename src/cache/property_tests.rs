//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain `HashMap` model and to
//! verify the counting and capacity rules under arbitrary operation mixes.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::thread::{self, sleep};
use std::time::Duration;

use crate::cache::{Cache, EvictionPolicy, StoreKind, Value};
use crate::config::CacheConfig;
use crate::error::CacheError;

// == Strategies ==
/// Generates cache keys from a small alphabet so sequences collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

/// Generates arbitrary keys for single-key properties
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        "[a-zA-Z0-9 ]{0,64}".prop_map(Value::Str),
        any::<bool>().prop_map(Value::Bool),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

fn store_kind_strategy() -> impl Strategy<Value = StoreKind> {
    prop_oneof![Just(StoreKind::Locked), Just(StoreKind::Sharded)]
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Add { key: String, value: Value },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Add { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn new_cache(kind: StoreKind) -> Cache {
    Cache::new(CacheConfig::default().with_store_kind(kind)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Property 1: Round-trip storage
    // Storing a pair and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(
        kind in store_kind_strategy(),
        key in valid_key_strategy(),
        value in value_strategy()
    ) {
        let cache = new_cache(kind);

        cache.set(key.clone(), value.clone()).unwrap();

        prop_assert_eq!(cache.get(&key), Some(value));
    }

    // Property 2: Delete removes entry
    #[test]
    fn prop_delete_removes_entry(
        kind in store_kind_strategy(),
        key in valid_key_strategy(),
        value in value_strategy()
    ) {
        let cache = new_cache(kind);
        cache.set(key.clone(), value).unwrap();

        prop_assert!(cache.delete(&key));
        prop_assert_eq!(cache.get(&key), None);
        prop_assert_eq!(cache.size(), 0);
    }

    // Property 3: Overwrite semantics
    // A second set of the same key wins and does not grow the cache.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache = new_cache(StoreKind::Locked);

        cache.set(key.clone(), value1).unwrap();
        cache.set(key.clone(), value2.clone()).unwrap();

        prop_assert_eq!(cache.get(&key), Some(value2));
        prop_assert_eq!(cache.size(), 1);
    }

    // Property 4: Size accounting
    // N distinct sets followed by M deletes of distinct set keys leaves N - M.
    #[test]
    fn prop_size_after_sets_and_deletes(
        kind in store_kind_strategy(),
        keys in prop::collection::hash_set(valid_key_strategy(), 1..60),
        delete_ratio in 0.0f64..=1.0
    ) {
        let cache = new_cache(kind);
        let keys: Vec<String> = keys.into_iter().collect();
        for key in &keys {
            cache.set(key.clone(), 1).unwrap();
        }

        let deletes = (keys.len() as f64 * delete_ratio) as usize;
        for key in keys.iter().take(deletes) {
            prop_assert!(cache.delete(key));
        }

        prop_assert_eq!(cache.size(), keys.len() - deletes);
        prop_assert_eq!(cache.keys("").len(), keys.len() - deletes);
    }

    // Property 5: Model equivalence
    // Any sequence of operations leaves the cache agreeing with a HashMap.
    #[test]
    fn prop_matches_hashmap_model(
        kind in store_kind_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let cache = new_cache(kind);
        let mut model: HashMap<String, Value> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key.clone(), value.clone()).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Add { key, value } => {
                    let result = cache.add(key.clone(), value.clone());
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::KeyAlreadyExists(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    }
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key).cloned());
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(cache.delete(&key), model.remove(&key).is_some());
                }
            }
            prop_assert_eq!(cache.size(), model.len());
        }

        let keys: HashSet<String> = cache.keys("").into_iter().collect();
        let expected: HashSet<String> = model.keys().cloned().collect();
        prop_assert_eq!(keys, expected);
    }

    // Property 6: Statistics accuracy
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = new_cache(StoreKind::Sharded);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key, value).unwrap();
                }
                CacheOp::Add { key, value } => {
                    let _ = cache.add(key, value);
                }
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, cache.size(), "Total entries mismatch");
    }

    // Property 7: Capacity enforcement
    // With an evicting policy the cache never holds more than its capacity,
    // and with Reject every insert past capacity fails.
    #[test]
    fn prop_capacity_enforcement(
        kind in store_kind_strategy(),
        keys in prop::collection::vec(key_strategy(), 1..100),
        capacity in 1usize..10
    ) {
        let evicting = Cache::new(
            CacheConfig::default()
                .with_store_kind(kind)
                .with_capacity(capacity, EvictionPolicy::AnyEntry),
        )
        .unwrap();
        let rejecting = Cache::new(
            CacheConfig::default()
                .with_store_kind(kind)
                .with_capacity(capacity, EvictionPolicy::Reject),
        )
        .unwrap();

        for key in keys {
            evicting.set(key.clone(), 1).unwrap();
            prop_assert!(evicting.size() <= capacity);

            let was_full = rejecting.size() >= capacity;
            let present = rejecting.exists(&key);
            let result = rejecting.set(key, 1);
            if was_full && !present {
                prop_assert!(matches!(result, Err(CacheError::CapacityExceeded(_))));
            } else {
                prop_assert!(result.is_ok());
            }
            prop_assert!(rejecting.size() <= capacity);
        }
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // Property 8: TTL expiration behavior
    // An entry is visible before its TTL elapses and gone afterwards, and
    // its removal is counted exactly once.
    #[test]
    fn prop_ttl_expiration_behavior(
        kind in store_kind_strategy(),
        key in valid_key_strategy(),
        value in value_strategy()
    ) {
        let cache = new_cache(kind);
        cache
            .set_with_expire(key.clone(), value.clone(), Some(Duration::from_millis(100)))
            .unwrap();

        prop_assert_eq!(cache.get(&key), Some(value));

        sleep(Duration::from_millis(150));

        prop_assert_eq!(cache.get(&key), None);
        prop_assert_eq!(cache.sweep_expired(), 0);
        prop_assert_eq!(cache.size(), 0);
    }
}

// == Property Test for Concurrent Operation Correctness ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    // Property 9: Concurrent counting
    // Whatever interleaving threads produce, the counter ends equal to the
    // number of keys actually stored.
    #[test]
    fn prop_concurrent_size_matches_contents(
        kind in store_kind_strategy(),
        batches in prop::collection::vec(
            prop::collection::vec(cache_op_strategy(), 10..40),
            2..6
        )
    ) {
        let cache = new_cache(kind);

        thread::scope(|scope| {
            for batch in &batches {
                let cache = cache.clone();
                scope.spawn(move || {
                    for op in batch {
                        match op {
                            CacheOp::Set { key, value } => {
                                cache.set(key.clone(), value.clone()).unwrap();
                            }
                            CacheOp::Add { key, value } => {
                                let _ = cache.add(key.clone(), value.clone());
                            }
                            CacheOp::Get { key } => {
                                cache.get(key);
                            }
                            CacheOp::Delete { key } => {
                                cache.delete(key);
                            }
                        }
                    }
                });
            }
        });

        prop_assert_eq!(cache.size(), cache.keys("").len());
    }
}

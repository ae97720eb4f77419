//! Object pooling.
//!
//! [`ObjectPool`] is the raw layer: per-kind, capacity-bounded rent/return
//! with ownership moving in and out of the pool. A miss is reported as
//! `None` and the caller decides how to allocate. [`Psr7Pool`] is the typed
//! layer on top that always hands out a usable HTTP message object.
//!
//! ```text
//!            rent(kind) ──► Some(Box<T>) | None
//!   caller ◄───────────────────────────────────── ObjectPool
//!            release(kind, Box<T>) ──► kept | dropped (full / disabled)
//! ```
//!
//! Pool operations never fail: an empty pool, a full pool, a disabled pool
//! or a type mismatch all degrade to "allocate fresh" / "drop".

mod arena;
mod psr7;

pub use psr7::Psr7Pool;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;

use arena::Bucket;

/// Default capacity per kind.
pub const DEFAULT_CAPACITY: usize = 100;

/// Well-known pool kinds.
pub mod kinds {
    pub const URI: &str = "uri";
    pub const STREAM: &str = "stream";
    pub const REQUEST: &str = "request";
    pub const RESPONSE: &str = "response";
    pub const JSON_BUFFER: &str = "json_buffer";

    pub const ALL: [&str; 5] = [URI, STREAM, REQUEST, RESPONSE, JSON_BUFFER];
}

/// Statistics for one kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KindStats {
    /// Objects currently pooled.
    pub size: usize,
    pub capacity: usize,
    /// `size / capacity` in percent.
    pub utilization: f64,
    pub hits: u64,
    pub misses: u64,
    pub returned: u64,
    pub discarded: u64,
}

/// Pool statistics snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoolStats {
    pub enabled: bool,
    pub max_pool_size: usize,
    pub pools: BTreeMap<String, KindStats>,
}

struct State {
    enabled: bool,
    capacity: usize,
    buckets: HashMap<String, Bucket>,
}

impl State {
    fn bucket(&mut self, kind: &str) -> &mut Bucket {
        let capacity = self.capacity;
        self.buckets
            .entry(kind.to_string())
            .or_insert_with(|| Bucket::new(capacity))
    }
}

/// Capacity-bounded rent/return store keyed by kind.
pub struct ObjectPool {
    state: Mutex<State>,
}

impl ObjectPool {
    /// Create an enabled pool with the given per-kind capacity.
    pub fn new(capacity: usize) -> Self {
        let buckets = kinds::ALL
            .iter()
            .map(|k| (k.to_string(), Bucket::new(capacity)))
            .collect();

        Self {
            state: Mutex::new(State {
                enabled: true,
                capacity,
                buckets,
            }),
        }
    }

    /// Take the most recently returned object of `kind`.
    ///
    /// `None` means the caller must allocate: the pool is empty, disabled, or
    /// held an object of a different type (which is then dropped).
    pub fn rent<T: Any + Send>(&self, kind: &str) -> Option<Box<T>> {
        let mut state = self.state.lock();
        if !state.enabled {
            return None;
        }

        let bucket = state.bucket(kind);
        match bucket.take() {
            Some(item) => match item.downcast::<T>() {
                Ok(obj) => {
                    bucket.hits += 1;
                    Some(obj)
                }
                Err(_) => {
                    bucket.misses += 1;
                    bucket.discarded += 1;
                    tracing::debug!(kind = kind, "pooled object had unexpected type, dropped");
                    None
                }
            },
            None => {
                bucket.misses += 1;
                None
            }
        }
    }

    /// Hand an object back. Returns whether it was kept.
    pub fn release<T: Any + Send>(&self, kind: &str, object: Box<T>) -> bool {
        let mut state = self.state.lock();
        if !state.enabled {
            return false;
        }

        let bucket = state.bucket(kind);
        match bucket.put(object) {
            Ok(()) => {
                bucket.returned += 1;
                true
            }
            Err(_dropped) => {
                bucket.discarded += 1;
                false
            }
        }
    }

    /// Objects currently pooled under `kind`.
    pub fn size(&self, kind: &str) -> usize {
        self.state
            .lock()
            .buckets
            .get(kind)
            .map(Bucket::len)
            .unwrap_or(0)
    }

    pub fn enable(&self) {
        self.state.lock().enabled = true;
    }

    /// Disable pooling and drop everything pooled.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        state.enabled = false;
        for bucket in state.buckets.values_mut() {
            bucket.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Set the capacity of every kind, including kinds created later.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        for bucket in state.buckets.values_mut() {
            bucket.set_capacity(capacity);
        }
    }

    /// Set the capacity of one kind.
    pub fn set_kind_capacity(&self, kind: &str, capacity: usize) {
        self.state.lock().bucket(kind).set_capacity(capacity);
    }

    /// Drop every pooled object.
    pub fn clear(&self) {
        for bucket in self.state.lock().buckets.values_mut() {
            bucket.clear();
        }
    }

    /// Drop pooled objects of one kind.
    pub fn clear_kind(&self, kind: &str) {
        if let Some(bucket) = self.state.lock().buckets.get_mut(kind) {
            bucket.clear();
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let pools = state
            .buckets
            .iter()
            .map(|(kind, bucket)| {
                let size = bucket.len();
                let capacity = bucket.capacity();
                let utilization = if capacity == 0 {
                    0.0
                } else {
                    size as f64 / capacity as f64 * 100.0
                };
                (
                    kind.clone(),
                    KindStats {
                        size,
                        capacity,
                        utilization,
                        hits: bucket.hits,
                        misses: bucket.misses,
                        returned: bucket.returned,
                        discarded: bucket.discarded,
                    },
                )
            })
            .collect();

        PoolStats {
            enabled: state.enabled,
            max_pool_size: state.capacity,
            pools,
        }
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Thing(u32);

    #[test]
    fn test_capacity_bound_discards_excess() {
        let pool = ObjectPool::new(3);
        for n in 0..5 {
            pool.release(kinds::REQUEST, Box::new(Thing(n)));
        }

        let stats = pool.stats();
        assert_eq!(stats.pools[kinds::REQUEST].size, 3);
        assert_eq!(stats.pools[kinds::REQUEST].discarded, 2);
        assert_eq!(stats.pools[kinds::REQUEST].utilization, 100.0);

        let mut rented = Vec::new();
        while let Some(thing) = pool.rent::<Thing>(kinds::REQUEST) {
            rented.push(thing.0);
        }
        assert_eq!(rented, vec![2, 1, 0]);
    }

    #[test]
    fn test_rent_returns_same_object() {
        let pool = ObjectPool::default();
        let thing = Box::new(Thing(7));
        let addr = &*thing as *const Thing;

        assert!(pool.release(kinds::STREAM, thing));
        let rented = pool.rent::<Thing>(kinds::STREAM).unwrap();
        assert_eq!(&*rented as *const Thing, addr);
        assert_eq!(pool.stats().pools[kinds::STREAM].hits, 1);
    }

    #[test]
    fn test_empty_pool_signals_none() {
        let pool = ObjectPool::default();
        assert!(pool.rent::<Thing>(kinds::URI).is_none());
        assert_eq!(pool.stats().pools[kinds::URI].misses, 1);
    }

    #[test]
    fn test_disabled_pool_is_uniform() {
        let pool = ObjectPool::default();
        pool.release(kinds::URI, Box::new(Thing(1)));
        pool.disable();

        assert!(!pool.is_enabled());
        assert!(!pool.release(kinds::URI, Box::new(Thing(2))));
        assert!(pool.rent::<Thing>(kinds::URI).is_none());
        assert_eq!(pool.size(kinds::URI), 0);

        pool.enable();
        assert!(pool.release(kinds::URI, Box::new(Thing(3))));
        assert_eq!(pool.rent::<Thing>(kinds::URI), Some(Box::new(Thing(3))));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let pool = ObjectPool::default();
        pool.release(kinds::RESPONSE, Box::new(Thing(1)));
        assert!(pool.rent::<String>(kinds::RESPONSE).is_none());
        assert_eq!(pool.size(kinds::RESPONSE), 0);
    }

    #[test]
    fn test_set_capacity_and_clear() {
        let pool = ObjectPool::new(10);
        for n in 0..6 {
            pool.release("custom", Box::new(Thing(n)));
        }
        assert_eq!(pool.size("custom"), 6);

        pool.set_kind_capacity("custom", 2);
        assert_eq!(pool.size("custom"), 2);

        pool.set_capacity(1);
        assert_eq!(pool.size("custom"), 1);
        assert_eq!(pool.stats().max_pool_size, 1);

        pool.release(kinds::URI, Box::new(Thing(9)));
        pool.clear_kind("custom");
        assert_eq!(pool.size("custom"), 0);
        assert_eq!(pool.size(kinds::URI), 1);

        pool.clear();
        assert_eq!(pool.size(kinds::URI), 0);
    }

    #[test]
    fn test_default_kinds_are_reported() {
        let stats = ObjectPool::default().stats();
        assert!(stats.enabled);
        assert_eq!(stats.max_pool_size, DEFAULT_CAPACITY);
        for kind in kinds::ALL {
            assert_eq!(stats.pools[kind].size, 0);
            assert_eq!(stats.pools[kind].capacity, DEFAULT_CAPACITY);
        }
    }
}

//! Capacity-bounded cache with pluggable storage and eviction policy.

pub mod store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::EngineResult;
use store::CacheStore;

/// Total order over cache items used to pick eviction victims. Items
/// sort ascending by the policy's key; `trim` evicts from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Evict least-recently-used items first.
    Lru,
    /// Evict most-recently-used items first.
    Mru,
    /// Evict least-frequently-used items first.
    Lfu,
    /// Evict by an arbitrary but deterministic bit of the access count —
    /// a stand-in for random replacement that needs no RNG dependency.
    Rr,
}

/// Monotonic stand-in for wall-clock access time, relative to the
/// cache's construction. Avoids `Instant::now()` arithmetic leaking
/// outside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccessTime(std::time::Duration);

impl AccessTime {
    fn as_micros(self) -> u128 {
        self.0.as_micros()
    }
}

/// A cached item: its stored representation plus the bookkeeping a
/// [`Policy`] needs to rank it for eviction.
#[derive(Debug, Clone)]
struct CacheItem<S = ()> {
    key: String,
    stored_value: S,
    stored_size: usize,
    creation_time: AccessTime,
    access_time: AccessTime,
    access_count: u64,
}

/// A capacity-bounded, single-mutex cache with pluggable storage and
/// eviction policy, optionally backed by a parent cache that absorbs
/// items trimmed from this one.
///
/// `capacity` and `threshold` define `max_size = capacity * threshold`:
/// the cache starts trimming once occupancy would exceed `max_size`,
/// leaving headroom below `capacity` for store-specific overshoot.
pub struct Cache<V, S: CacheStore<V>> {
    store: S,
    capacity: f64,
    threshold: f64,
    policy: Policy,
    parent: Option<Arc<Cache<V, S>>>,
    inner: Mutex<Inner<S::Stored>>,
    epoch: Instant,
}

struct Inner<Stored> {
    items: HashMap<String, CacheItem<Stored>>,
    size: usize,
}

impl<V, S: CacheStore<V>> Cache<V, S> {
    pub fn new(store: S, capacity: f64, threshold: f64, policy: Policy) -> Self {
        Self {
            store,
            capacity,
            threshold,
            policy,
            parent: None,
            inner: Mutex::new(Inner {
                items: HashMap::new(),
                size: 0,
            }),
            epoch: Instant::now(),
        }
    }

    pub fn with_parent(mut self, parent: Arc<Cache<V, S>>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_size(&self) -> f64 {
        self.capacity * self.threshold
    }

    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    fn now(&self) -> AccessTime {
        AccessTime(self.epoch.elapsed())
    }

    /// Look up `key`, falling through to the parent cache (if any) and
    /// adopting the value back into this cache's store on a parent hit
    /// would be an ownership change the original never performs; a
    /// parent hit is returned without being copied up, matching the
    /// reference `get_value`.
    pub fn get_value(&self, key: &str) -> EngineResult<Option<V>> {
        let now = self.now();
        let mut guard = self.inner.lock();
        if let Some(item) = guard.items.get_mut(key) {
            item.access_time = now;
            item.access_count += 1;
            let value = self.store.restore_value(key, &item.stored_value)?;
            return Ok(Some(value));
        }
        drop(guard);
        if let Some(parent) = &self.parent {
            return parent.get_value(key);
        }
        Ok(None)
    }

    pub fn put_value(&self, key: &str, value: V) -> EngineResult<()> {
        if let Some(parent) = &self.parent {
            parent.remove_value(key)?;
        }
        let now = self.now();
        let mut guard = self.inner.lock();
        if let Some(old) = guard.items.remove(key) {
            guard.size -= old.stored_size;
            self.store.discard_value(key, &old.stored_value);
        }
        let (stored_value, stored_size) = self.store.store_value(key, value)?;
        if guard.size + stored_size > self.max_size() as usize {
            drop(guard);
            self.trim(stored_size)?;
            guard = self.inner.lock();
        }
        guard.size += stored_size;
        guard.items.insert(
            key.to_string(),
            CacheItem {
                key: key.to_string(),
                stored_value,
                stored_size,
                creation_time: now,
                access_time: now,
                access_count: 1,
            },
        );
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> EngineResult<()> {
        if let Some(parent) = &self.parent {
            parent.remove_value(key)?;
        }
        let mut guard = self.inner.lock();
        if let Some(item) = guard.items.remove(key) {
            guard.size -= item.stored_size;
            self.store.discard_value(key, &item.stored_value);
        }
        Ok(())
    }

    /// Select and evict victims so that, once `extra_size` more units are
    /// admitted, occupancy no longer exceeds `max_size`.
    ///
    /// Victims are chosen while the *projected residual size* — current
    /// size minus what's already been marked for eviction — stays above
    /// `max_size - extra_size`. This is the corrected form of the
    /// original's trim: a single running total decremented only for
    /// items actually selected, never re-derived from a stale sign.
    pub fn trim(&self, extra_size: usize) -> EngineResult<()> {
        let max_size = self.max_size() as usize;
        let victims: Vec<String> = {
            let guard = self.inner.lock();
            let policy = self.policy;
            let mut ordered: Vec<&CacheItem<S::Stored>> = guard.items.values().collect();
            ordered.sort_by_key(|item| policy.sort_key(item));
            let mut projected = guard.size;
            let mut victims = Vec::new();
            for item in ordered {
                if projected + extra_size > max_size {
                    victims.push(item.key.clone());
                    projected -= item.stored_size;
                } else {
                    break;
                }
            }
            victims
        };

        for key in victims {
            if let Some(parent) = &self.parent {
                if let Some(value) = self.get_value(&key)? {
                    self.remove_value(&key)?;
                    parent.put_value(&key, value)?;
                    tracing::debug!(key, "trimmed item promoted to parent cache");
                } else {
                    self.remove_value(&key)?;
                }
            } else {
                self.remove_value(&key)?;
                tracing::debug!(key, "trimmed item discarded");
            }
        }
        Ok(())
    }

    /// Drop every item. Clears the parent cache too unless
    /// `clear_parent` is false, in which case this cache's items are
    /// handed up to the parent before being removed locally.
    pub fn clear(&self, clear_parent: bool) -> EngineResult<()> {
        if let Some(parent) = &self.parent {
            if clear_parent {
                parent.clear(clear_parent)?;
            }
        }
        let keys: Vec<String> = {
            let guard = self.inner.lock();
            guard.items.keys().cloned().collect()
        };
        for key in keys {
            if let Some(parent) = &self.parent {
                if !clear_parent {
                    if let Some(value) = self.get_value(&key)? {
                        parent.put_value(&key, value)?;
                    }
                }
            }
            self.remove_value(&key)?;
        }
        Ok(())
    }
}

impl Policy {
    fn sort_key<S>(self, item: &CacheItem<S>) -> i64 {
        match self {
            Policy::Lru => item.access_time.as_micros() as i64,
            Policy::Mru => -(item.access_time.as_micros() as i64),
            Policy::Lfu => item.access_count as i64,
            Policy::Rr => (item.access_count % 2) as i64,
        }
    }
}

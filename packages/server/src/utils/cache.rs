//! Bounded in-process caches with coarse invalidation.
//!
//! Entries expire 30 minutes after write or 10 minutes after last read,
//! whichever comes first; any mutation of the cached aggregate clears the
//! whole cache. Coarse, but trivially correct.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_WRITE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry<V> {
    value: V,
    inserted: Instant,
    last_access: Instant,
}

/// LRU cache with write-TTL and read-idleness expiry.
pub struct TtlCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    write_ttl: Duration,
    idle_ttl: Duration,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WRITE_TTL, DEFAULT_IDLE_TTL)
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, write_ttl: Duration, idle_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("capacity is non-zero"),
            )),
            write_ttl,
            idle_ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();

        let expired = match cache.get_mut(key) {
            Some(entry) => {
                if now.duration_since(entry.inserted) > self.write_ttl
                    || now.duration_since(entry.last_access) > self.idle_ttl
                {
                    true
                } else {
                    entry.last_access = now;
                    return Some(entry.value.clone());
                }
            }
            None => return None,
        };

        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = Instant::now();
        self.inner.lock().expect("cache lock poisoned").put(
            key.into(),
            Entry {
                value,
                inserted: now,
                last_access: now,
            },
        );
    }

    /// Wholesale invalidation, called at every mutation site of the
    /// aggregate this cache fronts.
    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

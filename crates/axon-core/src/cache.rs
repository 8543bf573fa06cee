use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::CacheLimits;
use crate::error::Result;

struct CacheEntry<V> {
    value: V,
    byte_size: usize,
    last_accessed: Instant,
    access_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub item_count: usize,
    pub total_size: usize,
    pub max_size: usize,
    pub average_access_count: f64,
}

/// Bounded key-value store: at most `max_items` entries, at most `max_size`
/// accounted bytes, entries untouched for longer than `ttl` treated as
/// absent. Eviction is LRU over an insertion-order recency queue; expiry is
/// checked lazily at access time, so no background timer is needed.
pub struct BoundedCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    recency: VecDeque<String>,
    current_size: usize,
    max_size: usize,
    max_items: usize,
    ttl: Duration,
}

impl<V> BoundedCache<V> {
    pub fn new(limits: CacheLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            recency: VecDeque::new(),
            current_size: 0,
            max_size: limits.max_size,
            max_items: limits.max_items,
            ttl: limits.ttl(),
        })
    }

    /// Look up `key`. A hit refreshes recency and access accounting; an entry
    /// past its TTL is purged and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        if self.expire_if_stale(key) {
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = Instant::now();
        entry.access_count += 1;
        self.mark_recent(key);
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Same expiry semantics as `get`, but without perturbing recency.
    pub fn has(&mut self, key: &str) -> bool {
        if self.expire_if_stale(key) {
            return false;
        }
        self.entries.contains_key(key)
    }

    /// Insert `value` under `key`, accounting `byte_size` bytes.
    ///
    /// A value larger than the whole cache is never stored: rejecting it
    /// keeps one oversized value from evicting everything else. Otherwise any
    /// existing entry for `key` is replaced (its size refunded), already
    /// expired entries are purged, and least-recently-used entries are
    /// evicted until both limits hold.
    pub fn set(&mut self, key: &str, value: V, byte_size: usize) {
        if byte_size > self.max_size {
            debug!(
                "cache: rejecting oversized entry '{}' ({} > {} bytes)",
                key, byte_size, self.max_size
            );
            return;
        }

        self.remove_entry(key);
        self.purge_expired();

        while self.current_size + byte_size > self.max_size || self.entries.len() >= self.max_items
        {
            let Some(oldest) = self.recency.front().cloned() else {
                break;
            };
            trace!("cache: evicting '{}'", oldest);
            self.remove_entry(&oldest);
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                byte_size,
                last_accessed: Instant::now(),
                access_count: 0,
            },
        );
        self.recency.push_back(key.to_string());
        self.current_size += byte_size;
    }

    /// Remove `key`, refunding its size. Returns whether an entry existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let item_count = self.entries.len();
        let total_accesses: u64 = self.entries.values().map(|e| e.access_count).sum();
        CacheStats {
            item_count,
            total_size: self.current_size,
            max_size: self.max_size,
            average_access_count: if item_count == 0 {
                0.0
            } else {
                total_accesses as f64 / item_count as f64
            },
        }
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        self.current_size -= entry.byte_size;
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        true
    }

    /// Purge `key` if it has outlived the TTL. Returns true when purged.
    fn expire_if_stale(&mut self, key: &str) -> bool {
        let stale = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.last_accessed.elapsed() > self.ttl);
        if stale {
            trace!("cache: expiring '{}'", key);
            self.remove_entry(key);
        }
        stale
    }

    fn purge_expired(&mut self) {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_accessed.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.remove_entry(&key);
        }
    }

    fn mark_recent(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_size: usize, max_items: usize) -> CacheLimits {
        CacheLimits::new(max_size, max_items, Duration::from_secs(3600))
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 100);
        cache.set("b", 2, 100);
        cache.set("c", 3, 100);
        cache.set("d", 4, 100);

        assert!(!cache.has("a"), "oldest entry should be evicted");
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 100);
        cache.set("b", 2, 100);
        cache.set("c", 3, 100);

        assert_eq!(cache.get("a"), Some(&1));
        cache.set("d", 4, 100);

        assert!(cache.has("a"), "refreshed entry must survive");
        assert!(!cache.has("b"), "'b' is now the oldest and should go");
    }

    #[test]
    fn test_has_does_not_perturb_recency() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 100);
        cache.set("b", 2, 100);
        cache.set("c", 3, 100);

        assert!(cache.has("a"));
        cache.set("d", 4, 100);

        assert!(!cache.has("a"), "has() must not refresh recency");
    }

    #[test]
    fn test_item_limit() {
        let mut cache = BoundedCache::new(limits(1000, 2)).unwrap();
        cache.set("a", 1, 10);
        cache.set("b", 2, 10);
        cache.set("c", 3, 10);

        assert_eq!(cache.len(), 2);
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_exact_max_size_accepted_one_byte_over_rejected() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("exact", 1, 300);
        assert!(cache.has("exact"));
        assert_eq!(cache.stats().total_size, 300);

        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("over", 1, 301);
        assert!(!cache.has("over"), "oversized value must never be stored");
        assert_eq!(cache.stats().total_size, 0);
    }

    #[test]
    fn test_replacing_refunds_size() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 200);
        cache.set("a", 2, 100);
        assert_eq!(cache.stats().total_size, 100);
        assert_eq!(cache.get("a"), Some(&2));
    }

    #[test]
    fn test_size_invariants_under_arbitrary_sets() {
        let mut cache = BoundedCache::new(limits(500, 7)).unwrap();
        for i in 0..50 {
            cache.set(&format!("k{}", i), i, (i * 37) % 220 + 1);
            let stats = cache.stats();
            assert!(stats.total_size <= 500);
            assert!(stats.item_count <= 7);
        }
    }

    #[test]
    fn test_ttl_expiry_on_access() {
        let short = CacheLimits::new(300, 10, Duration::from_millis(0));
        let mut cache = BoundedCache::new(short).unwrap();
        cache.set("a", 1, 100);
        std::thread::sleep(Duration::from_millis(15));

        assert_eq!(cache.get("a"), None, "expired entry is a miss");
        assert_eq!(cache.stats().total_size, 0, "expired entry is purged");
    }

    #[test]
    fn test_delete() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 100);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.stats().total_size, 0);
    }

    #[test]
    fn test_clear() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 100);
        cache.set("b", 2, 100);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_size, 0);
    }

    #[test]
    fn test_stats_access_counts() {
        let mut cache = BoundedCache::new(limits(300, 10)).unwrap();
        cache.set("a", 1, 50);
        cache.set("b", 2, 50);
        cache.get("a");
        cache.get("a");

        let stats = cache.stats();
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.average_access_count, 1.0);
    }

    #[test]
    fn test_zero_limits_rejected_at_construction() {
        let result: Result<BoundedCache<i32>> =
            BoundedCache::new(CacheLimits::new(0, 10, Duration::from_secs(1)));
        assert!(result.is_err());
    }
}

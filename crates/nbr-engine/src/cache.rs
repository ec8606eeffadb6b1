//! Completed-computation cache keyed by computation inputs.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use nbr_common::BoundingBox;
use serde::Serialize;

/// Serialize a computation's identifying inputs to a stable string key.
///
/// Two requests with the same key are the same computation and must share a
/// result; the extent is quantized so floating-point noise cannot split keys.
pub fn computation_key(nir_url: &str, swir_url: &str, extent: &BoundingBox) -> String {
    format!("{}|{}|{}", nir_url, swir_url, extent.cache_key())
}

/// One completed NBR computation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Computed NBR values, row-major, sentinel included.
    pub values: Arc<Vec<f32>>,
    pub width: u32,
    pub height: u32,
    /// Geographic extent (degrees) of the first band's resolved window.
    pub extent: BoundingBox,
    /// Minimum valid NBR value observed.
    pub min: f32,
    /// Maximum valid NBR value observed.
    pub max: f32,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Result cache for completed computations.
///
/// Results are kept for the whole session by default; a bounded LRU is an
/// explicit opt-in for callers that know their session lifetime. Entries are
/// installed whole and superseded whole, never partially updated.
pub struct ResultCache {
    entries: LruCache<String, Arc<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Cache that grows for the lifetime of the session.
    pub fn unbounded() -> Self {
        Self {
            entries: LruCache::unbounded(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache bounded to `capacity` entries with LRU eviction.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a completed computation.
    pub fn get(&mut self, key: &str) -> Option<Arc<CacheEntry>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Install a completed computation, superseding any previous entry for
    /// the key.
    pub fn insert(&mut self, key: String, entry: Arc<CacheEntry>) {
        self.entries.put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(min: f32, max: f32) -> Arc<CacheEntry> {
        Arc::new(CacheEntry {
            values: Arc::new(vec![0.0; 4]),
            width: 2,
            height: 2,
            extent: BoundingBox::new(-122.0, 39.0, -121.0, 40.0),
            min,
            max,
        })
    }

    #[test]
    fn test_computation_key_includes_all_inputs() {
        let extent = BoundingBox::new(-122.0, 39.0, -121.0, 40.0);
        let key = computation_key("https://a/b8.tif", "https://a/b12.tif", &extent);

        assert!(key.contains("b8.tif"));
        assert!(key.contains("b12.tif"));
        assert!(key.contains(&extent.cache_key()));

        let other_extent = BoundingBox::new(-122.0, 39.0, -121.0, 40.5);
        let other = computation_key("https://a/b8.tif", "https://a/b12.tif", &other_extent);
        assert_ne!(key, other);
    }

    #[test]
    fn test_hit_and_miss_stats() {
        let mut cache = ResultCache::unbounded();
        assert!(cache.get("missing").is_none());

        cache.insert("k".to_string(), entry(-0.5, 0.5));
        assert!(cache.get("k").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_insert_supersedes() {
        let mut cache = ResultCache::unbounded();
        cache.insert("k".to_string(), entry(-0.5, 0.5));
        cache.insert("k".to_string(), entry(-0.1, 0.1));

        let got = cache.get("k").unwrap();
        assert_eq!(got.min, -0.1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_cache_evicts_lru() {
        let mut cache = ResultCache::with_capacity(NonZeroUsize::new(2).unwrap());
        cache.insert("a".to_string(), entry(0.0, 0.0));
        cache.insert("b".to_string(), entry(0.0, 0.0));
        cache.insert("c".to_string(), entry(0.0, 0.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_unbounded_cache_never_evicts() {
        let mut cache = ResultCache::unbounded();
        for i in 0..1000 {
            cache.insert(format!("k{}", i), entry(0.0, 0.0));
        }
        assert_eq!(cache.len(), 1000);
    }
}

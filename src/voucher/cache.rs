//! LRU cache of recovered voucher signers.
//!
//! ECDSA recovery is the expensive step of admission preflight. Vouchers are
//! immutable once signed, so the mapping from signing hash to recovered
//! address never changes and can be cached safely.

use alloy_primitives::{Address, B256};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default cache capacity (10,000 entries, one hash + address each).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// LRU cache keyed by EIP-712 signing hash.
///
/// The signing hash commits to every voucher field and the instance domain,
/// so a hit is exactly as strong as re-running recovery.
#[derive(Clone)]
pub struct RecoveredCache {
    inner: Arc<Mutex<LruCache<B256, Address>>>,
    stats: Arc<Mutex<RecoveredCacheStats>>,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct RecoveredCacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
}

impl RecoveredCacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl RecoveredCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(RecoveredCacheStats::default())),
        }
    }

    /// Look up the recovered signer for a signing hash.
    pub fn get(&self, hash: &B256) -> Option<Address> {
        let mut cache = self.inner.lock();
        let found = cache.get(hash).copied();

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Record a recovered signer for a signing hash.
    pub fn insert(&self, hash: B256, signer: Address) {
        let mut cache = self.inner.lock();
        cache.put(hash, signer);

        let mut stats = self.stats.lock();
        stats.additions += 1;
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> RecoveredCacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for RecoveredCache {
    fn default() -> Self {
        Self::new()
    }
}

//! Prepared-plan cache.
//!
//! Maps a [`Fingerprint`] to a shared prepared plan. All access goes through
//! [`PlanCache::get_or_create`], so callers never split a lookup from the
//! matching insert. The lock is released while a plan is being built:
//! concurrent misses on one fingerprint may both build, and the last insert
//! wins.
//!
//! The cache is unbounded unless a capacity is given, in which case the
//! least recently used plan is evicted.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use verdict_core::Fingerprint;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to build a plan
    pub misses: u64,
    /// Requests that opted out of caching
    pub bypasses: u64,
    /// Plans stored
    pub inserts: u64,
    /// Plans dropped to respect the capacity
    pub evictions: u64,
}

struct CacheState<P> {
    plans: LruCache<Fingerprint, Arc<P>>,
    stats: CacheStats,
}

/// Shared fingerprint → plan cache
pub struct PlanCache<P> {
    state: Mutex<CacheState<P>>,
    capacity: Option<NonZeroUsize>,
}

impl<P> PlanCache<P> {
    /// Create an unbounded cache
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a cache holding at most `capacity` plans (0 = unbounded)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity);
        let plans = match capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            state: Mutex::new(CacheState {
                plans,
                stats: CacheStats::default(),
            }),
            capacity,
        }
    }

    /// Return the cached plan for `fingerprint`, or build one.
    ///
    /// With `use_cache` set, a cached plan is returned without calling
    /// `builder`, and a freshly built plan is stored. Without it, `builder`
    /// always runs and nothing is read or written. A failed build stores
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns whatever error `builder` returns
    pub fn get_or_create<E, F>(
        &self,
        fingerprint: Fingerprint,
        use_cache: bool,
        builder: F,
    ) -> Result<Arc<P>, E>
    where
        F: FnOnce() -> Result<P, E>,
    {
        if use_cache {
            let mut state = self.lock();
            if let Some(plan) = state.plans.get(&fingerprint).cloned() {
                state.stats.hits += 1;
                tracing::debug!(fingerprint = %fingerprint.short(), "plan cache hit");
                return Ok(plan);
            }
            state.stats.misses += 1;
        } else {
            self.lock().stats.bypasses += 1;
        }

        let plan = Arc::new(builder()?);

        if use_cache {
            self.insert(fingerprint, Arc::clone(&plan));
            tracing::debug!(fingerprint = %fingerprint.short(), "plan cached");
        }

        Ok(plan)
    }

    fn insert(&self, fingerprint: Fingerprint, plan: Arc<P>) {
        let mut state = self.lock();
        let displaced = state.plans.push(fingerprint, plan);
        state.stats.inserts += 1;
        if let Some((key, _)) = displaced {
            if key != fingerprint {
                state.stats.evictions += 1;
                tracing::debug!(fingerprint = %key.short(), "plan evicted");
            }
        }
    }

    /// Check if a plan is cached, without touching recency
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().plans.contains(fingerprint)
    }

    /// Number of cached plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().plans.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity, `None` when unbounded
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Drop every cached plan
    pub fn clear(&self) {
        self.lock().plans.clear();
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // is still safe to use.
    fn lock(&self) -> MutexGuard<'_, CacheState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for PlanCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for PlanCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

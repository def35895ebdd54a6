//! Derived-view cache: memoizes expensive derivations (panel stats,
//! sequences, overlays) keyed by `(roster_version, event_seq, lane,
//! window)`. A cache hit is correct by construction: any roster mutation or
//! event append changes one of those two version numbers, so a stale key
//! simply never matches again rather than needing to be actively evicted.
//!
//! Modeled on the scraper module's `latest: ArcSwap<BookTickerSnapshot>`
//! lock-free-publish pattern: reads never block behind a writer, and a
//! miss does a copy-on-write swap of the whole map rather than locking it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::models::Lane;
use crate::resolver::RotationEngine;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub roster_version: u64,
    pub event_seq: u64,
    pub lane: Lane,
    /// Caller-composed label identifying the view and its parameters, e.g.
    /// `"collapsed"` or `"day:2026-06-15"` — anything that varies the result
    /// independent of roster/event state (such as a query's `today` anchor)
    /// must be folded into this label, since it is the only other key field.
    pub window: String,
}

impl CacheKey {
    /// Builds the current key for `lane`/`window` from the engine's live
    /// roster version and event log length.
    pub fn current(engine: &RotationEngine, lane: Lane, window: impl Into<String>) -> anyhow::Result<Self> {
        let roster_version = engine.roster().snapshot().version;
        let event_seq = engine.event_store().all()?.last().map(|e| e.seq).unwrap_or(0);
        Ok(Self {
            roster_version,
            event_seq,
            lane,
            window: window.into(),
        })
    }
}

/// A lock-free-read memoization table for one kind of derived value.
pub struct DerivedViewCache<T> {
    entries: ArcSwap<HashMap<CacheKey, Arc<T>>>,
}

impl<T> Default for DerivedViewCache<T> {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl<T> DerivedViewCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, computing and publishing it via
    /// `compute` on a miss.
    pub fn get_or_compute(&self, key: CacheKey, compute: impl FnOnce() -> T) -> Arc<T> {
        if let Some(existing) = self.entries.load().get(&key) {
            return existing.clone();
        }
        let value = Arc::new(compute());
        let mut next = (**self.entries.load()).clone();
        next.insert(key, value.clone());
        self.entries.store(Arc::new(next));
        value
    }

    /// Fallible counterpart of `get_or_compute`: an `Err` from `compute` is
    /// never published. Without this, a transient failure on a miss (e.g. a
    /// storage error reading the event log) would otherwise cache whatever
    /// placeholder the caller invented for the error case and serve it on
    /// every subsequent hit for that key, silently masking the failure.
    pub fn try_get_or_compute<E>(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(existing) = self.entries.load().get(&key) {
            return Ok(existing.clone());
        }
        let value = Arc::new(compute()?);
        let mut next = (**self.entries.load()).clone();
        next.insert(key, value.clone());
        self.entries.store(Arc::new(next));
        Ok(value)
    }

    /// Drops every entry. Not required for correctness (stale keys are
    /// simply unreachable once the version numbers move on) but bounds
    /// memory growth across a long-running process.
    pub fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::InMemoryEventStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    fn key(event_seq: u64) -> CacheKey {
        CacheKey {
            roster_version: 1,
            event_seq,
            lane: Lane::Sub1k,
            window: "alltime".to_string(),
        }
    }

    #[test]
    fn recomputes_only_on_a_miss() {
        let cache: DerivedViewCache<i64> = DerivedViewCache::new();
        let calls = StdArc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let first = cache.get_or_compute(key(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
            42
        });
        let c = calls.clone();
        let second = cache.get_or_compute(key(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
            99
        });

        assert_eq!(*first, 42);
        assert_eq!(*second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_new_event_seq_is_a_fresh_key() {
        let cache: DerivedViewCache<i64> = DerivedViewCache::new();
        cache.get_or_compute(key(1), || 1);
        cache.get_or_compute(key(2), || 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn a_failed_compute_is_never_published() {
        let cache: DerivedViewCache<i64> = DerivedViewCache::new();
        let first: Result<Arc<i64>, &str> = cache.try_get_or_compute(key(1), || Err("boom"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second = cache
            .try_get_or_compute::<&str>(key(1), || Ok(7))
            .unwrap();
        assert_eq!(*second, 7);
    }

    #[test]
    fn current_key_changes_when_the_event_log_grows() {
        let engine = RotationEngine::new(StdArc::new(InMemoryEventStore::new()), vec![], 100).unwrap();
        let before = CacheKey::current(&engine, Lane::Sub1k, "alltime").unwrap();
        engine
            .skip("A", crate::event::SkipTarget::Sub1k, chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
            .unwrap();
        let after = CacheKey::current(&engine, Lane::Sub1k, "alltime").unwrap();
        assert_ne!(before, after);
    }
}

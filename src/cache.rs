//! Time-bounded memoization of computed results.
//!
//! Entries expire a fixed TTL after insertion and are never refreshed by
//! reads. Expired entries are treated as misses and dropped the next time
//! anything is inserted.
//!
//! The cache does not coalesce concurrent misses: two callers missing the
//! same key both compute, and the last insert wins. The lock is only held
//! for map access, never while a computation (or an `.await`) is running.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use runwatch_types::Repository;
use tracing::debug;

use crate::data::DayWindow;

/// Source of the current instant, injectable for tests.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.elapsed.lock()
    }
}

/// Identifies a cached result.
///
/// The trigger graph depends only on the repository and is cached with
/// `window: None`; health results are cached per window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repository: Repository,
    pub window: Option<DayWindow>,
}

impl CacheKey {
    pub fn repository(repository: &Repository) -> Self {
        Self {
            repository: repository.clone(),
            window: None,
        }
    }

    pub fn windowed(repository: &Repository, window: DayWindow) -> Self {
        Self {
            repository: repository.clone(),
            window: Some(window),
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL cache safe to share between tasks.
///
/// Values are cloned out on every hit, so `V` is usually an `Arc`.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| now < e.expires_at)
            .map(|e| e.value.clone())
    }

    /// Store a value, purging any expired entries first.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Evicted expired cache entries");
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the live value for `key`, or compute and store it.
    ///
    /// A failed computation stores nothing.
    pub fn get_or_compute<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            debug!(?key, "Cache hit");
            return Ok(value);
        }
        debug!(?key, "Cache miss");

        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Async variant of [`TtlCache::get_or_compute`].
    pub async fn get_or_compute_async<E, F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            debug!(?key, "Cache hit");
            return Ok(value);
        }
        debug!(?key, "Cache miss");

        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_cache(ttl_secs: u64) -> (TtlCache<&'static str, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = make_cache(300);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(42)
        };

        assert_eq!(cache.get_or_compute("a", compute), Ok(42));
        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get_or_compute("a", compute), Ok(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_expired_entry_is_recomputed() {
        let (cache, clock) = make_cache(300);
        cache.insert("a", 1);

        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get_or_compute("a", || Ok::<_, ()>(2)), Ok(2));
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_expired_entries_purged_on_insert() {
        let (cache, clock) = make_cache(10);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.len(), 2);

        clock.advance(Duration::from_secs(11));
        // Still stored until the next insert.
        assert_eq!(cache.len(), 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let (cache, _clock) = make_cache(300);

        let result = cache.get_or_compute("a", || Err::<u32, _>("boom"));
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());

        assert_eq!(cache.get_or_compute("a", || Ok::<_, &str>(7)), Ok(7));
    }

    #[test]
    fn test_reads_do_not_extend_lifetime() {
        let (cache, clock) = make_cache(10);
        cache.insert("a", 1);

        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.get(&"a"), Some(1));
        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (cache, _clock) = make_cache(10);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_async_compute() {
        let (cache, clock) = make_cache(60);

        let v = cache
            .get_or_compute_async("a", || async { Ok::<_, ()>(5) })
            .await;
        assert_eq!(v, Ok(5));

        let v = cache
            .get_or_compute_async("a", || async { Ok::<_, ()>(6) })
            .await;
        assert_eq!(v, Ok(5));

        clock.advance(Duration::from_secs(61));
        let v = cache
            .get_or_compute_async("a", || async { Ok::<_, ()>(6) })
            .await;
        assert_eq!(v, Ok(6));
    }

    #[tokio::test]
    async fn test_concurrent_misses_each_compute() {
        let (cache, _clock) = make_cache(300);
        let calls = AtomicUsize::new(0);
        let compute = |value: u32| {
            let calls = &calls;
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // Let the other callers reach their own miss first.
                tokio::task::yield_now().await;
                Ok::<_, ()>(value)
            }
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_compute_async("a", compute(1)),
            cache.get_or_compute_async("a", compute(2)),
            cache.get_or_compute_async("a", compute(3)),
        );

        assert_eq!((a, b, c), (Ok(1), Ok(2), Ok(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
        let stored = cache.get(&"a").unwrap();
        assert!([1, 2, 3].contains(&stored));

        // The surviving value is served without computing again.
        let again = cache
            .get_or_compute_async("a", compute(4))
            .await
            .unwrap();
        assert_eq!(again, stored);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_between_tasks() {
        let cache: Arc<TtlCache<u32, u32>> = Arc::new(TtlCache::new(Duration::from_secs(300)));

        let handles: Vec<_> = (0..8u32)
            .map(|task| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for i in 0..50u32 {
                        let key = (task * 50 + i) % 64;
                        cache.insert(key, key * 10);
                        if let Some(value) = cache.get(&key) {
                            assert_eq!(value, key * 10);
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 64);
        for key in 0..64u32 {
            assert_eq!(cache.get(&key), Some(key * 10));
        }
    }

    #[test]
    fn test_cache_keys_distinguish_windows() {
        use chrono::NaiveDate;

        let repo = Repository::new("acme", "app");
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let graph = CacheKey::repository(&repo);
        let health = CacheKey::windowed(&repo, DayWindow::single(day));

        assert_ne!(graph, health);
        assert_eq!(health, CacheKey::windowed(&repo, DayWindow::single(day)));
    }
}

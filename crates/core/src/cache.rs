//! TTL-bounded, content-addressed cache shared by all generation runs.
//!
//! Keys are fingerprints (see [`crate::hashing::fingerprint`]) of the semantic
//! inputs to one stage. Expiry is lazy: an entry read at or after its
//! `expires_at` is a miss and stays in the map until
//! [`ContentCache::purge_expired`] runs or a newer value overwrites it.
//!
//! Concurrent misses on the same key are coalesced by
//! [`ContentCache::get_or_try_insert_with`]: the first caller spawns the
//! computation on its own task and every caller awaits its shared result.
//! The task runs to completion even when all callers go away, so the
//! in-flight entry is always cleared and a finished value still lands in the
//! cache. The locks below only ever guard map bookkeeping and are never held
//! across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;
use tokio::time::Instant;

/// Default time-to-live for cache entries (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Inner<V, E> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<String, InFlight<V, E>>>,
}

/// Removes the in-flight entry when the computation task ends, panics included.
struct InFlightGuard<V, E> {
    inner: Arc<Inner<V, E>>,
    key: String,
}

impl<V, E> Drop for InFlightGuard<V, E> {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

impl<V: Clone, E> Inner<V, E> {
    fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    fn put(&self, key: String, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }
}

/// Content-addressed cache of stage outputs (`V`), coalescing concurrent
/// computations that fail with `E`.
///
/// Cheap to clone; clones share the same entries.
pub struct ContentCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for ContentCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> ContentCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Return the cached value for `key` unless absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    /// Store `value` under `key`, replacing any previous entry (last writer wins).
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.inner.put(key.into(), value);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Return the cached value for `key`, or run `make` to produce it.
    ///
    /// Concurrent callers missing on the same key share one execution of the
    /// future returned by the first caller's `make`, spawned onto the runtime.
    /// Successful values are cached; errors are returned to every waiter and
    /// not cached. A panicking computation reaches waiters as `E::from(JoinError)`.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, make: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.inner.get(key) {
            return Ok(value);
        }

        let shared = {
            let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    // A computation may have finished between the first
                    // lookup and taking the in-flight lock.
                    if let Some(value) = self.inner.get(key) {
                        return Ok(value);
                    }
                    let guard = InFlightGuard {
                        inner: Arc::clone(&self.inner),
                        key: key.to_string(),
                    };
                    let computation = make();
                    // The guard cannot remove the entry before it is inserted
                    // below: removal takes the in-flight lock held here.
                    let task = tokio::spawn(async move {
                        let result = computation.await;
                        if let Ok(value) = &result {
                            guard.inner.put(guard.key.clone(), value.clone());
                        }
                        drop(guard);
                        result
                    });
                    let shared = async move {
                        match task.await {
                            Ok(result) => result,
                            Err(join_error) => Err(E::from(join_error)),
                        }
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    impl From<JoinError> for TestError {
        fn from(err: JoinError) -> Self {
            TestError(err.to_string())
        }
    }

    type TextCache = ContentCache<String, TestError>;

    #[tokio::test(start_paused = true)]
    async fn hit_before_ttl_miss_after() {
        let cache = TextCache::new(Duration::from_secs(3600));
        cache.put("k", "narration".to_string());

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(cache.get("k").as_deref(), Some("narration"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
        // Lazy expiry: the entry is still stored until purged.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expires_exactly_at_ttl() {
        let cache = TextCache::new(Duration::from_secs(10));
        cache.put("k", "v".to_string());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = TextCache::new(DEFAULT_TTL);
        cache.put("k", "first".to_string());
        cache.put("k", "second".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn hit_skips_computation() {
        let cache = TextCache::new(DEFAULT_TTL);
        cache.put("k", "cached".to_string());
        let value = cache
            .get_or_try_insert_with("k", || async {
                Err::<String, _>(TestError("must not run".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value, "cached");
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_computation() {
        let cache = TextCache::new(DEFAULT_TTL);
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: TextCache, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_try_insert_with("k", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, TestError>("computed".to_string())
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), Arc::clone(&calls)),
            run(cache.clone(), Arc::clone(&calls))
        );
        assert_eq!(a.unwrap(), "computed");
        assert_eq!(b.unwrap(), "computed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k").as_deref(), Some("computed"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = TextCache::new(DEFAULT_TTL);
        let err = cache
            .get_or_try_insert_with("k", || async { Err::<String, _>(TestError("boom".to_string())) })
            .await
            .unwrap_err();
        assert_eq!(err, TestError("boom".to_string()));
        assert_eq!(cache.get("k"), None);

        let value = cache
            .get_or_try_insert_with("k", || async { Ok::<_, TestError>("retry".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "retry");
    }

    #[tokio::test]
    async fn abandoned_computation_finishes_and_is_cached() {
        let cache = TextCache::new(DEFAULT_TTL);
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let first = cache.get_or_try_insert_with("k", move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TestError>("computed".to_string())
        });
        // The only waiter gives up while the computation is still running.
        assert!(tokio::time::timeout(Duration::from_millis(10), first)
            .await
            .is_err());
        assert_eq!(cache.in_flight(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.get("k").as_deref(), Some("computed"));

        let value = cache
            .get_or_try_insert_with("k", || async {
                Err::<String, _>(TestError("must not run".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value, "computed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoned_failure_does_not_block_later_callers() {
        let cache = TextCache::new(DEFAULT_TTL);

        let first = cache.get_or_try_insert_with("k", || async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err::<String, _>(TestError("deadline passed".to_string()))
        });
        assert!(tokio::time::timeout(Duration::from_millis(5), first)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.in_flight(), 0);

        let value = cache
            .get_or_try_insert_with("k", || async { Ok::<_, TestError>("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }

    #[tokio::test]
    async fn panicking_computation_is_reported_and_cleared() {
        let cache = TextCache::new(DEFAULT_TTL);

        let err = cache
            .get_or_try_insert_with("k", || async {
                if std::hint::black_box(true) {
                    panic!("image decoder bug");
                }
                Ok::<_, TestError>("unreachable".to_string())
            })
            .await
            .unwrap_err();
        assert!(err.0.contains("panic"), "unexpected error: {err:?}");
        assert_eq!(cache.in_flight(), 0);

        let value = cache
            .get_or_try_insert_with("k", || async { Ok::<_, TestError>("recovered".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
    }
}

//! Fingerprint-keyed audio cache with per-key single flight.
//!
//! The cache stores finished [`GenerationResult`]s in a bounded FIFO ring. A
//! hit does not move an entry; eviction is strictly by insertion order.
//!
//! [`AudioCache::get_or_generate`] makes lookup, synthesis and store atomic per
//! fingerprint: the first caller for a key runs the work, every concurrent
//! caller for the same key awaits that caller's outcome (success or error).
//! Distinct keys never wait on each other; the only cache-wide critical
//! sections are the short map operations below. The work itself runs on its
//! own task, so it finishes even when every waiting caller goes away.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{Fingerprint, normalize_text};
pub use store::{FifoStore, PutOutcome};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::error::{PipelineError, PipelineResult};
use super::types::GenerationResult;

/// Default number of cached results
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

type SharedOutcome = Shared<BoxFuture<'static, PipelineResult<Arc<GenerationResult>>>>;

/// How a [`AudioCache::get_or_generate`] call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    /// Served from the store
    Hit,
    /// Awaited another caller's in-flight synthesis
    Joined,
    /// This caller ran the synthesis
    Generated,
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub len: usize,
    pub capacity: usize,
    pub in_flight: usize,
}

/// Bounded audio cache
pub struct AudioCache {
    enabled: bool,
    store: Mutex<FifoStore<Fingerprint, Arc<GenerationResult>>>,
    in_flight: Mutex<HashMap<Fingerprint, SharedOutcome>>,
}

impl AudioCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: capacity > 0,
            store: Mutex::new(FifoStore::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that stores nothing; every lookup is a miss
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a fingerprint.
    ///
    /// Fails with [`PipelineError::CacheUnavailable`] when the cache is
    /// disabled; callers treat that as a miss.
    pub fn try_get(&self, key: &Fingerprint) -> PipelineResult<Option<Arc<GenerationResult>>> {
        if !self.enabled {
            return Err(PipelineError::CacheUnavailable("cache disabled".to_string()));
        }
        Ok(self.store.lock().get(key).cloned())
    }

    /// Look up a fingerprint, treating an unavailable cache as a miss
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<GenerationResult>> {
        match self.try_get(key) {
            Ok(found) => {
                if found.is_some() {
                    debug!(fingerprint = ?key, "Cache hit");
                }
                found
            }
            Err(_) => None,
        }
    }

    pub fn put(&self, key: Fingerprint, result: Arc<GenerationResult>) {
        if !self.enabled {
            return;
        }
        match self.store.lock().put(key, result) {
            PutOutcome::Evicted(old) => {
                debug!(fingerprint = ?key, evicted = ?old, "Cache full, evicted oldest entry")
            }
            PutOutcome::Inserted | PutOutcome::Replaced => {
                debug!(fingerprint = ?key, "Cached audio")
            }
            PutOutcome::Discarded => {}
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let (len, capacity) = {
            let store = self.store.lock();
            (store.len(), store.capacity())
        };
        CacheStats {
            enabled: self.enabled,
            len,
            capacity,
            in_flight: self.in_flight.lock().len(),
        }
    }

    /// Return the cached result for `key`, or run `work` exactly once across
    /// all concurrent callers for the same key and cache its success.
    ///
    /// Failures are shared with the callers that joined but are not cached.
    pub async fn get_or_generate<Fut>(
        self: &Arc<Self>,
        key: Fingerprint,
        work: Fut,
    ) -> PipelineResult<(Arc<GenerationResult>, LookupSource)>
    where
        Fut: Future<Output = PipelineResult<GenerationResult>> + Send + 'static,
    {
        if let Some(hit) = self.get(&key) {
            return Ok((hit, LookupSource::Hit));
        }

        let (outcome, source) = {
            let mut in_flight = self.in_flight.lock();
            if let Some(existing) = in_flight.get(&key) {
                debug!(fingerprint = ?key, "Joining in-flight synthesis");
                (existing.clone(), LookupSource::Joined)
            } else if let Some(hit) = self.get(&key) {
                // Populated between the first lookup and taking the lock
                return Ok((hit, LookupSource::Hit));
            } else {
                debug!(fingerprint = ?key, "Cache miss");
                let cache = Arc::clone(self);
                // Runs detached so an abandoned caller still completes and
                // publishes the synthesis it started.
                let task = tokio::spawn(async move {
                    // Unregisters the key even if `work` panics
                    let _registration = InFlightRegistration {
                        cache: Arc::clone(&cache),
                        key,
                    };
                    let outcome = work.await.map(Arc::new);
                    if let Ok(result) = &outcome {
                        cache.put(key, Arc::clone(result));
                    }
                    outcome
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(PipelineError::ModelFailure(format!("synthesis task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                in_flight.insert(key, shared.clone());
                (shared, LookupSource::Generated)
            }
        };

        outcome.await.map(|result| (result, source))
    }
}

/// Removes a key from the in-flight map when the synthesis task ends, however
/// it ends.
struct InFlightRegistration {
    cache: Arc<AudioCache>,
    key: Fingerprint,
}

impl Drop for InFlightRegistration {
    fn drop(&mut self) {
        self.cache.in_flight.lock().remove(&self.key);
    }
}

impl Default for AudioCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn result(tag: &str) -> GenerationResult {
        GenerationResult {
            audio: Bytes::from(tag.to_string()),
            sample_rate: 24000,
            duration_secs: 1.0,
            character_id: "narrator".to_string(),
            voice_id: "narrator".to_string(),
            language: "en".to_string(),
            generation_ms: 5,
            cached: false,
        }
    }

    fn key(text: &str) -> Fingerprint {
        Fingerprint::compute(text, "narrator", "narrator")
    }

    #[test]
    fn test_capacity_eviction_is_fifo() {
        let cache = AudioCache::new(3);
        for text in ["one", "two", "three", "four"] {
            cache.put(key(text), Arc::new(result(text)));
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key("one")).is_none());
        for text in ["two", "three", "four"] {
            assert_eq!(cache.get(&key(text)).unwrap().audio, Bytes::from(text));
        }
    }

    #[test]
    fn test_disabled_cache_always_misses() {
        let cache = AudioCache::disabled();
        cache.put(key("one"), Arc::new(result("one")));

        assert!(!cache.is_enabled());
        assert!(cache.get(&key("one")).is_none());
        assert!(matches!(
            cache.try_get(&key("one")),
            Err(PipelineError::CacheUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_generate_caches_success() {
        let cache = Arc::new(AudioCache::new(10));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        let (first, source) = cache
            .get_or_generate(key("hello"), async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(result("hello"))
            })
            .await
            .unwrap();
        assert_eq!(source, LookupSource::Generated);

        let counter = Arc::clone(&runs);
        let (second, source) = cache
            .get_or_generate(key("hello"), async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(result("hello"))
            })
            .await
            .unwrap();
        assert_eq!(source, LookupSource::Hit);
        assert_eq!(first.audio, second.audio);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Arc::new(AudioCache::new(10));
        let err = cache
            .get_or_generate(key("bad"), async { Err(PipelineError::EmptyOutput) })
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyOutput);
        assert!(cache.is_empty());

        let (_, source) = cache
            .get_or_generate(key("bad"), async { Ok(result("bad")) })
            .await
            .unwrap();
        assert_eq!(source, LookupSource::Generated);
    }

    #[tokio::test]
    async fn test_panicking_synthesis_does_not_pin_key() {
        let cache = Arc::new(AudioCache::new(10));

        let err = cache
            .get_or_generate(key("crash"), async {
                if true {
                    panic!("model worker crashed");
                }
                Ok(result("crash"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelFailure(_)));
        assert_eq!(cache.stats().in_flight, 0);
        assert!(cache.is_empty());

        let (res, source) = cache
            .get_or_generate(key("crash"), async { Ok(result("crash")) })
            .await
            .unwrap();
        assert_eq!(source, LookupSource::Generated);
        assert_eq!(res.audio, Bytes::from("crash"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_keys_run_once() {
        let cache = Arc::new(AudioCache::new(10));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_generate(key("same"), async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(result("same"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let (res, _) = handle.await.unwrap().unwrap();
            assert_eq!(res.audio, Bytes::from("same"));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_joined_callers_share_failure() {
        let cache = Arc::new(AudioCache::new(10));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_generate(key("fails"), async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(PipelineError::ModelFailure("gpu fault".into()))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(PipelineError::ModelFailure(_))
            ));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}

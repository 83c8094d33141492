//! Cached enrichment lookups.
//!
//! A `LookupSource` performs one network request for one key. `CachedLookup`
//! puts a TTL cache in front of it:
//! - success → cached for the long TTL
//! - authoritative not-found → cached as an empty value for the short TTL
//! - rate limited / transient → not cached, empty value for this attempt

use std::time::Duration;

use async_trait::async_trait;
use flight_core::TtlCache;

use crate::http::FetchError;

/// One upstream enrichment endpoint.
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// Enrichment payload; `Default` is the empty "nothing known" value.
    type Value: Clone + Default + Send + Sync;

    /// Short name for log lines.
    fn kind(&self) -> &'static str;

    async fn fetch(&self, key: &str) -> Result<Self::Value, FetchError>;
}

pub struct CachedLookup<S: LookupSource> {
    source: S,
    cache: TtlCache<String, S::Value>,
    found_ttl: Duration,
    not_found_ttl: Duration,
}

impl<S: LookupSource> CachedLookup<S> {
    pub fn new(source: S, found_ttl: Duration, not_found_ttl: Duration) -> Self {
        CachedLookup {
            source,
            cache: TtlCache::new(),
            found_ttl,
            not_found_ttl,
        }
    }

    /// Fresh cached value (positive or negative) without touching the network.
    pub fn cached(&self, key: &str) -> Option<S::Value> {
        self.cache.get(&key.to_string())
    }

    /// Cache first, then one network call. Returns the value and whether it
    /// came from cache. An empty key yields the empty value with no call.
    pub async fn lookup(&mut self, key: &str) -> (S::Value, bool) {
        if key.is_empty() {
            return (S::Value::default(), false);
        }
        if let Some(value) = self.cached(key) {
            return (value, true);
        }
        (self.fetch_and_cache(key).await, false)
    }

    async fn fetch_and_cache(&mut self, key: &str) -> S::Value {
        let kind = self.source.kind();
        match self.source.fetch(key).await {
            Ok(value) => {
                tracing::debug!(kind, key, "lookup succeeded");
                self.cache
                    .set(key.to_string(), value.clone(), self.found_ttl);
                value
            }
            Err(e) if !e.is_transient() => {
                tracing::debug!(kind, key, "no data upstream; caching negative result");
                self.cache
                    .set(key.to_string(), S::Value::default(), self.not_found_ttl);
                S::Value::default()
            }
            Err(FetchError::RateLimited) => {
                tracing::warn!(kind, key, "rate limited; will retry next cycle");
                S::Value::default()
            }
            Err(e) => {
                tracing::warn!(kind, key, error = %e, "lookup failed");
                S::Value::default()
            }
        }
    }

    /// Drop expired entries. Returns count removed.
    pub fn sweep(&mut self) -> usize {
        self.cache.sweep()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Source answering from a fixed table; unknown keys get `default_error`.
    /// Records every key it is asked for.
    pub struct FakeSource<V> {
        pub answers: HashMap<String, Result<V, FetchError>>,
        pub default_error: FetchError,
        pub calls: Arc<AtomicUsize>,
        pub keys: Arc<Mutex<Vec<String>>>,
    }

    impl<V> FakeSource<V> {
        pub fn new(answers: Vec<(&str, Result<V, FetchError>)>) -> Self {
            FakeSource {
                answers: answers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                default_error: FetchError::NotFound,
                calls: Arc::new(AtomicUsize::new(0)),
                keys: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_default_error(mut self, error: FetchError) -> Self {
            self.default_error = error;
            self
        }
    }

    #[async_trait]
    impl<V> LookupSource for FakeSource<V>
    where
        V: Clone + Default + Send + Sync + 'static,
    {
        type Value = V;

        fn kind(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, key: &str) -> Result<V, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(key.to_string());
            self.answers
                .get(key)
                .cloned()
                .unwrap_or_else(|| Err(self.default_error.clone()))
        }
    }

    fn make_lookup(source: FakeSource<String>) -> CachedLookup<FakeSource<String>> {
        CachedLookup::new(source, Duration::from_secs(3600), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_hit_after_success() {
        let source = FakeSource::new(vec![("BAW12", Ok("KJFK-EGLL".to_string()))]);
        let calls = source.calls.clone();
        let mut lookup = make_lookup(source);

        assert_eq!(lookup.lookup("BAW12").await, ("KJFK-EGLL".to_string(), false));
        assert_eq!(lookup.lookup("BAW12").await, ("KJFK-EGLL".to_string(), true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_cached_as_negative() {
        let source = FakeSource::new(vec![("ZZZ1", Err(FetchError::NotFound))]);
        let calls = source.calls.clone();
        let mut lookup = make_lookup(source);

        assert_eq!(lookup.lookup("ZZZ1").await, (String::new(), false));
        assert_eq!(lookup.cached("ZZZ1"), Some(String::new()));
        assert_eq!(lookup.lookup("ZZZ1").await, (String::new(), true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_not_cached() {
        let source = FakeSource::new(vec![("DAL1", Err(FetchError::RateLimited))]);
        let calls = source.calls.clone();
        let mut lookup = make_lookup(source);

        assert_eq!(lookup.lookup("DAL1").await, (String::new(), false));
        assert!(lookup.cached("DAL1").is_none());
        lookup.lookup("DAL1").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_not_cached() {
        let source = FakeSource::new(vec![
            ("A", Err(FetchError::Timeout)),
            ("B", Err(FetchError::Status(503))),
            ("C", Err(FetchError::Malformed("bad".into()))),
        ]);
        let mut lookup = make_lookup(source);
        for key in ["A", "B", "C"] {
            lookup.lookup(key).await;
            assert!(lookup.cached(key).is_none(), "{key} should not be cached");
        }
        assert_eq!(lookup.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_empty_key_skips_network() {
        let source = FakeSource::<String>::new(vec![]);
        let calls = source.calls.clone();
        let mut lookup = make_lookup(source);

        assert_eq!(lookup.lookup("").await, (String::new(), false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_expires_before_positive() {
        let source = FakeSource::new(vec![
            ("GOOD", Ok("x".to_string())),
            ("GONE", Err(FetchError::NotFound)),
        ]);
        let mut lookup = CachedLookup::new(
            source,
            Duration::from_secs(3600),
            Duration::from_millis(20),
        );
        lookup.lookup("GOOD").await;
        lookup.lookup("GONE").await;
        assert_eq!(lookup.cache_len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(lookup.cached("GONE").is_none());
        assert_eq!(lookup.sweep(), 1);
        assert_eq!(lookup.cached("GOOD"), Some("x".to_string()));
    }
}

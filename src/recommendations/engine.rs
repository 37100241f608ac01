//! Recommendation engine implementation.
//!
//! Serves pages out of a per-seed accumulated list:
//! 1. Requests that fit inside the cached list are answered from it
//! 2. Otherwise a new batch is generated, merged into the list and cached
//! 3. A changed steering instruction drops the list and starts over
//!
//! The engine keeps no state of its own between requests.

use crate::metrics::{self, MetricsSink};
use crate::recommendations::cache::RecommendationCache;
use crate::recommendations::errors::RecommendationError;
use crate::recommendations::generator::RecommendationGenerator;
use crate::recommendations::types::{
    normalize_steering, Page, PageRequest, RecommendationEntry, SeedKey,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Append each entry of `batch` whose title is not already present,
/// comparing titles case-insensitively. Returns the number appended.
pub fn merge(list: &mut Vec<RecommendationEntry>, batch: Vec<RecommendationEntry>) -> usize {
    let mut seen: HashSet<String> = list.iter().map(RecommendationEntry::title_key).collect();
    let before = list.len();

    for entry in batch {
        if seen.insert(entry.title_key()) {
            list.push(entry);
        }
    }

    list.len() - before
}

pub struct RecommendationEngine {
    cache: RecommendationCache,
    generator: RecommendationGenerator,
    desired_count: usize,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl RecommendationEngine {
    pub fn new(cache: RecommendationCache, generator: RecommendationGenerator) -> Self {
        Self {
            cache,
            generator,
            desired_count: crate::config::DESIRED_COUNT,
            metrics: None,
        }
    }

    /// Batch size requested from the generator on a miss.
    pub fn with_desired_count(mut self, desired_count: usize) -> Self {
        self.desired_count = desired_count;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    /// Serve one page of recommendations for `request.seed_key`.
    ///
    /// Only store failures and invalid requests are errors; generator
    /// failures end in fallback entries.
    pub async fn get_page(&self, request: &PageRequest) -> Result<Page, RecommendationError> {
        if request.seed_tracks.is_empty() {
            return Err(RecommendationError::NoSeedTracks);
        }
        if request.limit == 0 {
            return Err(RecommendationError::InvalidLimit);
        }

        self.record(metrics::PAGE_REQUESTS);
        let seed = &request.seed_key;
        let steering = normalize_steering(request.steering.as_deref());

        log::info!(
            "Recommendations requested for '{}' (offset: {}, limit: {})",
            seed,
            request.offset,
            request.limit
        );

        if request.force_clear && request.offset == 0 {
            log::info!("Force clear requested for '{}'", seed);
            self.cache.clear(seed).await?;
        }

        self.sync_steering(seed, steering.as_deref()).await?;

        let cached = self.cache.get(seed).await?;
        if let Some(list) = &cached {
            if request.offset < list.len() {
                log::debug!(
                    "Serving '{}' from cache ({} accumulated)",
                    seed,
                    list.len()
                );
                self.record(metrics::CACHE_HITS);
                return Ok(Page::slice(list, request.offset, request.limit));
            }
        }

        let mut merged = cached.unwrap_or_default();
        let batch = self
            .generator
            .generate(
                &request.seed_tracks,
                &merged,
                self.desired_count,
                steering.as_deref(),
            )
            .await;

        let batch_len = batch.len();
        let added = merge(&mut merged, batch);
        log::info!(
            "Merged {} of {} generated recommendations for '{}' ({} total)",
            added,
            batch_len,
            seed,
            merged.len()
        );

        self.cache.put(seed, &merged).await?;

        // Another request may have written in between; serve what is stored.
        let page = match self.cache.get(seed).await? {
            Some(stored) => Page::slice(&stored, request.offset, request.limit),
            None => {
                log::warn!("Cached list for '{}' vanished after write", seed);
                Page::slice(&merged, request.offset, request.limit)
            }
        };

        Ok(page)
    }

    /// Drop the list when the steering instruction differs from the stored one.
    async fn sync_steering(
        &self,
        seed: &SeedKey,
        steering: Option<&str>,
    ) -> Result<(), RecommendationError> {
        let previous = self.cache.get_steering(seed).await?;
        if previous.as_deref() == steering {
            return Ok(());
        }

        log::info!(
            "Steering changed for '{}' from {:?} to {:?}, clearing cache",
            seed,
            previous,
            steering
        );
        self.cache.clear(seed).await?;
        match steering {
            Some(steering) => self.cache.put_steering(seed, steering).await,
            None => self.cache.clear_steering(seed).await,
        }
    }

    /// Forget the accumulated list for `seed`; its steering instruction stays.
    pub async fn clear_recommendations(&self, seed: &SeedKey) -> Result<(), RecommendationError> {
        self.cache.clear(seed).await
    }

    /// Forget both the list and the steering instruction for `seed`.
    pub async fn clear_seed_data(&self, seed: &SeedKey) -> Result<(), RecommendationError> {
        self.cache.clear_seed(seed).await
    }

    pub async fn clear_all_caches(&self) -> Result<u64, RecommendationError> {
        self.cache.clear_all().await
    }

    pub async fn evict_expired(&self) -> Result<u64, RecommendationError> {
        self.cache.evict_expired().await
    }

    fn record(&self, counter: &str) {
        if let Some(sink) = &self.metrics {
            sink.increment_counter(counter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GenerationError, GenerationRequest, TextGenerator};
    use crate::metrics::ApiMetrics;
    use crate::recommendations::cache::DEFAULT_CACHE_TTL;
    use crate::recommendations::generator::RetryPolicy;
    use crate::store::{MemoryStore, StoreError, TtlStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Returns numbered batches of `batch_size` titles, counting calls.
    struct CountingGenerator {
        batch_size: usize,
        calls: Mutex<usize>,
        prompts: Mutex<Vec<String>>,
    }

    impl CountingGenerator {
        fn new(batch_size: usize) -> Arc<Self> {
            Arc::new(Self {
                batch_size,
                calls: Mutex::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            self.prompts.lock().push(request.prompt.clone());

            let items: Vec<serde_json::Value> = (0..self.batch_size)
                .map(|i| serde_json::json!({ "song_title": format!("Batch {} Song {}", call, i) }))
                .collect();
            Ok(serde_json::Value::Array(items).to_string())
        }
    }

    /// Always answers with the same body.
    struct FixedGenerator(String);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            Ok(self.0.clone())
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl TextGenerator for DownGenerator {
        fn name(&self) -> &str {
            "down"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            Err(GenerationError::Transport("connection refused".into()))
        }
    }

    fn engine_with(client: Arc<dyn TextGenerator>, store: Arc<MemoryStore>) -> RecommendationEngine {
        let generator = RecommendationGenerator::new(client).with_policy(RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        });
        RecommendationEngine::new(RecommendationCache::new(store, DEFAULT_CACHE_TTL), generator)
    }

    fn request(offset: usize, limit: usize) -> PageRequest {
        PageRequest::new(
            SeedKey::playlist("pl1"),
            vec!["Creep by Radiohead".to_string(), "Teardrop by Massive Attack".to_string()],
        )
        .with_page(offset, limit)
    }

    async fn seed_list(store: &Arc<MemoryStore>, n: usize) {
        let list: Vec<RecommendationEntry> = (0..n)
            .map(|i| RecommendationEntry::titled(format!("Cached {}", i)))
            .collect();
        RecommendationCache::new(store.clone(), DEFAULT_CACHE_TTL)
            .put(&SeedKey::playlist("pl1"), &list)
            .await
            .unwrap();
    }

    #[test]
    fn test_merge_is_case_insensitive() {
        let mut list = vec![RecommendationEntry::titled("Hey Jude")];
        let added = merge(
            &mut list,
            vec![
                RecommendationEntry::titled("hey jude"),
                RecommendationEntry::titled("Let It Be"),
                RecommendationEntry::titled("LET IT BE"),
            ],
        );

        assert_eq!(added, 1);
        let titles: Vec<&str> = list.iter().map(|e| e.song_title.as_str()).collect();
        assert_eq!(titles, vec!["Hey Jude", "Let It Be"]);
    }

    #[tokio::test]
    async fn test_validation() {
        let engine = engine_with(CountingGenerator::new(5), Arc::new(MemoryStore::new()));

        let empty = PageRequest::new(SeedKey::playlist("pl1"), vec![]);
        let err = engine.get_page(&empty).await.unwrap_err();
        assert!(matches!(err, RecommendationError::NoSeedTracks));

        let err = engine.get_page(&request(0, 0)).await.unwrap_err();
        assert!(matches!(err, RecommendationError::InvalidLimit));
    }

    #[tokio::test]
    async fn test_page_within_cache_skips_generation() {
        let store = Arc::new(MemoryStore::new());
        seed_list(&store, 25).await;
        let client = CountingGenerator::new(30);
        let engine = engine_with(client.clone(), store);

        let page = engine.get_page(&request(20, 10)).await.unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page.entries[0].song_title, "Cached 20");
        assert_eq!(page.total, 25);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_page_past_cache_generates_and_grows() {
        let store = Arc::new(MemoryStore::new());
        seed_list(&store, 25).await;
        let client = CountingGenerator::new(30);
        let engine = engine_with(client.clone(), store.clone());

        let page = engine.get_page(&request(30, 10)).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(page.total, 55);
        assert_eq!(page.entries[0].song_title, "Batch 1 Song 5");
        assert!(client.last_prompt().contains("- Cached 24"));

        // Earlier entries keep their positions.
        let first = engine.get_page(&request(0, 3)).await.unwrap();
        assert_eq!(first.titles(), vec!["Cached 0", "Cached 1", "Cached 2"]);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_cached_list_regenerates() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("recommendations:pl1", "{not json", DEFAULT_CACHE_TTL)
            .await
            .unwrap();
        let client = CountingGenerator::new(12);
        let engine = engine_with(client.clone(), store.clone());

        let page = engine.get_page(&request(0, 10)).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(page.total, 12);
        assert_eq!(page.entries[0].song_title, "Batch 1 Song 0");

        // The unreadable value was replaced by the fresh list.
        let stored = engine.cache().get(&SeedKey::playlist("pl1")).await.unwrap();
        assert_eq!(stored.map(|l| l.len()), Some(12));
    }

    #[tokio::test]
    async fn test_prefix_stable_across_generations() {
        let client = CountingGenerator::new(10);
        let engine = engine_with(client.clone(), Arc::new(MemoryStore::new()));

        let first = engine.get_page(&request(0, 10)).await.unwrap();
        let second = engine.get_page(&request(10, 10)).await.unwrap();
        let whole = engine.get_page(&request(0, 20)).await.unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(&whole.entries[..10], &first.entries[..]);
        assert_eq!(&whole.entries[10..], &second.entries[..]);
    }

    #[tokio::test]
    async fn test_steering_change_invalidates() {
        let store = Arc::new(MemoryStore::new());
        seed_list(&store, 25).await;
        let client = CountingGenerator::new(30);
        let engine = engine_with(client.clone(), store);

        let page = engine
            .get_page(&request(0, 10).with_steering(Some("only 80s".into())))
            .await
            .unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(page.total, 30);
        assert!(client.last_prompt().contains("I want you to only 80s."));

        // Same steering: served from cache.
        engine
            .get_page(&request(10, 10).with_steering(Some(" only 80s ".into())))
            .await
            .unwrap();
        assert_eq!(client.calls(), 1);

        // Dropping the steering also counts as a change.
        let page = engine.get_page(&request(0, 10)).await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(page.entries[0].song_title, "Batch 2 Song 0");
        assert_eq!(
            engine.cache().get_steering(&SeedKey::playlist("pl1")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_force_clear_only_at_offset_zero() {
        let store = Arc::new(MemoryStore::new());
        seed_list(&store, 25).await;
        let client = CountingGenerator::new(30);
        let engine = engine_with(client.clone(), store);

        engine.get_page(&request(10, 10).with_force_clear(true)).await.unwrap();
        assert_eq!(client.calls(), 0);

        let page = engine.get_page(&request(0, 10).with_force_clear(true)).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(page.total, 30);
    }

    #[tokio::test]
    async fn test_duplicate_batch_yields_empty_page() {
        let store = Arc::new(MemoryStore::new());
        let body = r#"[{"song_title":"Angel"},{"song_title":"ANGEL"},{"song_title":"Teardrop"}]"#;
        let engine = engine_with(Arc::new(FixedGenerator(body.into())), store);

        let first = engine.get_page(&request(0, 10)).await.unwrap();
        assert_eq!(first.titles(), vec!["Angel", "Teardrop"]);

        // Nothing new comes back, so the next page stays empty.
        let second = engine.get_page(&request(2, 10)).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.total, 2);
    }

    #[tokio::test]
    async fn test_generator_outage_serves_fallback() {
        let metrics = Arc::new(ApiMetrics::new());
        let engine = engine_with(Arc::new(DownGenerator), Arc::new(MemoryStore::new()))
            .with_metrics(metrics.clone());

        let page = engine.get_page(&request(0, 10)).await.unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page.total, 15);
        assert_eq!(metrics.counter(metrics::PAGE_REQUESTS), 1);
        assert_eq!(metrics.counter(metrics::CACHE_HITS), 0);
    }

    struct DownStore;

    #[async_trait]
    impl TtlStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn put(&self, _k: &str, _v: &str, _t: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn evict_expired(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_server_error() {
        let generator = RecommendationGenerator::new(CountingGenerator::new(5));
        let engine = RecommendationEngine::new(
            RecommendationCache::new(Arc::new(DownStore), DEFAULT_CACHE_TTL),
            generator,
        );

        let err = engine.get_page(&request(0, 10)).await.unwrap_err();
        assert_eq!(err.class(), crate::recommendations::errors::ErrorClass::ServerError);
    }

    #[tokio::test]
    async fn test_clear_recommendations_keeps_steering() {
        let store = Arc::new(MemoryStore::new());
        let client = CountingGenerator::new(10);
        let engine = engine_with(client.clone(), store);
        let seed = SeedKey::playlist("pl1");

        engine
            .get_page(&request(0, 5).with_steering(Some("more synths".into())))
            .await
            .unwrap();
        engine.clear_recommendations(&seed).await.unwrap();

        assert_eq!(engine.cache().get(&seed).await.unwrap(), None);
        assert_eq!(
            engine.cache().get_steering(&seed).await.unwrap().as_deref(),
            Some("more synths")
        );

        engine.clear_seed_data(&seed).await.unwrap();
        assert_eq!(engine.cache().get_steering(&seed).await.unwrap(), None);
    }
}

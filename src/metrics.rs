//! Optional counters and timings for the recommendation path.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const PAGE_REQUESTS: &str = "recommendations.page_requests";
pub const CACHE_HITS: &str = "recommendations.cache_hits";
pub const GENERATIONS: &str = "recommendations.generations";
pub const GENERATION_FAILURES: &str = "recommendations.generation_failures";
pub const FALLBACKS: &str = "recommendations.fallbacks";

pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &str);

    /// Latency of one call to the generative API, successful or not.
    fn record_generation_time(&self, elapsed: Duration);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationTimings {
    pub count: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl GenerationTimings {
    pub fn mean_ms(&self) -> Option<u64> {
        (self.count > 0).then(|| self.total_ms / self.count)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub generation: GenerationTimings,
}

#[derive(Default)]
struct Inner {
    counters: BTreeMap<String, u64>,
    generation: GenerationTimings,
}

/// In-process metrics registry.
#[derive(Default)]
pub struct ApiMetrics {
    inner: Mutex<Inner>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.inner.lock().counters.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            counters: inner.counters.clone(),
            generation: inner.generation.clone(),
        }
    }
}

impl MetricsSink for ApiMetrics {
    fn increment_counter(&self, name: &str) {
        *self.inner.lock().counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn record_generation_time(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let mut inner = self.inner.lock();
        let timings = &mut inner.generation;
        timings.count += 1;
        timings.total_ms += ms;
        timings.max_ms = timings.max_ms.max(ms);
    }
}

//! Per-seed recommendation cache.
//!
//! Holds two namespaces in the TTL store:
//!
//! ```text
//! recommendations:<seed>  -> JSON array of accumulated entries
//! custom_prompt:<seed>    -> last steering instruction used for <seed>
//! ```
//!
//! Every write resets the entry's expiry (24 hours by default).

use crate::recommendations::errors::RecommendationError;
use crate::recommendations::types::{RecommendationEntry, SeedKey};
use crate::store::TtlStore;
use std::sync::Arc;
use std::time::Duration;

const RECOMMENDATIONS_KEY_PREFIX: &str = "recommendations:";
const STEERING_KEY_PREFIX: &str = "custom_prompt:";

/// Default lifetime of cached lists and steering instructions (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct RecommendationCache {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl RecommendationCache {
    pub fn new(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn list_key(seed: &SeedKey) -> String {
        format!("{}{}", RECOMMENDATIONS_KEY_PREFIX, seed)
    }

    fn steering_key(seed: &SeedKey) -> String {
        format!("{}{}", STEERING_KEY_PREFIX, seed)
    }

    /// Accumulated list for `seed`.
    ///
    /// A stored value that no longer deserializes is reported as a miss.
    pub async fn get(
        &self,
        seed: &SeedKey,
    ) -> Result<Option<Vec<RecommendationEntry>>, RecommendationError> {
        let Some(json) = self.store.get(&Self::list_key(seed)).await? else {
            log::debug!("No cached recommendations for '{}'", seed);
            return Ok(None);
        };

        match serde_json::from_str::<Vec<RecommendationEntry>>(&json) {
            Ok(list) => {
                log::debug!("Retrieved {} cached recommendations for '{}'", list.len(), seed);
                Ok(Some(list))
            }
            Err(e) => {
                log::warn!(
                    "Discarding unreadable cached recommendations for '{}': {}",
                    seed,
                    e
                );
                Ok(None)
            }
        }
    }

    pub async fn put(
        &self,
        seed: &SeedKey,
        list: &[RecommendationEntry],
    ) -> Result<(), RecommendationError> {
        let json = serde_json::to_string(list)?;
        self.store.put(&Self::list_key(seed), &json, self.ttl).await?;
        log::info!("Cached {} recommendations for '{}'", list.len(), seed);
        Ok(())
    }

    pub async fn get_steering(&self, seed: &SeedKey) -> Result<Option<String>, RecommendationError> {
        Ok(self.store.get(&Self::steering_key(seed)).await?)
    }

    pub async fn put_steering(&self, seed: &SeedKey, steering: &str) -> Result<(), RecommendationError> {
        self.store
            .put(&Self::steering_key(seed), steering, self.ttl)
            .await?;
        log::info!("Cached steering instruction for '{}': '{}'", seed, steering);
        Ok(())
    }

    pub async fn clear_steering(&self, seed: &SeedKey) -> Result<(), RecommendationError> {
        self.store.delete(&Self::steering_key(seed)).await?;
        log::debug!("Cleared steering instruction for '{}'", seed);
        Ok(())
    }

    /// Remove the accumulated list only; the steering instruction stays.
    pub async fn clear(&self, seed: &SeedKey) -> Result<(), RecommendationError> {
        self.store.delete(&Self::list_key(seed)).await?;
        log::info!("Cleared cached recommendations for '{}'", seed);
        Ok(())
    }

    /// Remove both the list and the steering instruction for `seed`.
    pub async fn clear_seed(&self, seed: &SeedKey) -> Result<(), RecommendationError> {
        self.clear(seed).await?;
        self.clear_steering(seed).await
    }

    /// Remove every cached list and steering instruction.
    pub async fn clear_all(&self) -> Result<u64, RecommendationError> {
        let lists = self.store.delete_prefix(RECOMMENDATIONS_KEY_PREFIX).await?;
        let prompts = self.store.delete_prefix(STEERING_KEY_PREFIX).await?;
        log::info!(
            "Cleared all recommendation caches ({} lists, {} steering instructions)",
            lists,
            prompts
        );
        Ok(lists + prompts)
    }

    /// Drop expired entries from the underlying store.
    pub async fn evict_expired(&self) -> Result<u64, RecommendationError> {
        Ok(self.store.evict_expired().await?)
    }
}

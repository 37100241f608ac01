use super::{StoreError, TtlStore};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sqlx::{Pool, Sqlite};
use std::time::Duration;

/// TTL store backed by the `kv_cache` table.
///
/// Expiry is kept as a unix timestamp in milliseconds and checked on
/// every read, so expired rows are invisible even before eviction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl TtlStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_millis())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or(StoreError::InvalidTtl(ttl))?;

        sqlx::query(
            r#"
            INSERT INTO kv_cache (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires.timestamp_millis())
        .execute(&self.pool)
        .await?;

        log::debug!("Stored '{}' (expires {})", key, expires);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        // substr instead of LIKE: '_' is a LIKE wildcard and shows up in keys
        let result = sqlx::query("DELETE FROM kv_cache WHERE substr(key, 1, ?) = ?")
            .bind(prefix.chars().count() as i64)
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn evict_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM kv_cache WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            log::info!("Evicted {} expired cache entries", count);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn store() -> SqliteStore {
        let db = DatabaseManager::in_memory().await.unwrap();
        SqliteStore::new(db.pool)
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = store().await;
        store.put("k", "first", HOUR).await.unwrap();
        store.put("k", "second", HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_overflowing_ttl_rejected() {
        let store = store().await;

        // Fits in a TimeDelta but not past the latest representable date.
        let huge = Duration::from_secs(9_000_000_000_000_000);
        for ttl in [huge, Duration::MAX] {
            let err = store.put("k", "v", ttl).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidTtl(_)));
        }
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_row_hidden_then_evicted() {
        let store = store().await;
        store.put("old", "v", Duration::ZERO).await.unwrap();
        store.put("fresh", "v", HOUR).await.unwrap();

        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prefix_delete_treats_underscore_literally() {
        let store = store().await;
        store.put("custom_prompt:a", "1", HOUR).await.unwrap();
        store.put("customXprompt:b", "1", HOUR).await.unwrap();
        store.put("recommendations:a", "1", HOUR).await.unwrap();

        assert_eq!(store.delete_prefix("custom_prompt:").await.unwrap(), 1);
        assert!(store.get("customXprompt:b").await.unwrap().is_some());
        assert!(store.get("recommendations:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let db = DatabaseManager::open(&path).await.unwrap();
            SqliteStore::new(db.pool.clone())
                .put("k", "persisted", HOUR)
                .await
                .unwrap();
            db.pool.close().await;
        }

        let db = DatabaseManager::open(&path).await.unwrap();
        let store = SqliteStore::new(db.pool);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("persisted"));
    }
}

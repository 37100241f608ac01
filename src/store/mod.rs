//! TTL key-value store used to persist recommendation state.
//!
//! Two backends ship with the crate:
//!
//! ```text
//! SqliteStore  - survives restarts, shared by every process on the same file
//! MemoryStore  - process-local, used for tests and one-shot runs
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Expiry would fall outside the representable time range
    #[error("TTL of {0:?} is out of range")]
    InvalidTtl(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// String-keyed store with per-key expiry.
///
/// Reads never extend a key's lifetime; every `put` resets it.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Value for `key`, or `None` if missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite `key` and set its expiry to now + `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Drop expired entries. Returns the number removed.
    async fn evict_expired(&self) -> Result<u64, StoreError>;
}

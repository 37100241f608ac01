//! Typed errors for the recommendation system.
//!
//! Uses `thiserror` for ergonomic error definitions and implements
//! `Serialize` so errors can cross an API boundary cleanly.

use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors that can reach a caller of the recommendation engine.
///
/// Generation failures never show up here: they are retried and then
/// absorbed by the offline fallback.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum RecommendationError {
    /// The request carried no seed tracks
    #[error("No seed tracks provided for recommendations")]
    NoSeedTracks,

    /// A page was requested with a zero limit
    #[error("Page limit must be greater than zero")]
    InvalidLimit,

    /// The TTL store could not be reached
    #[error("Recommendation cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Internal/unexpected error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification for whoever turns errors into responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    BadRequest,
    ServerError,
}

impl RecommendationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RecommendationError::NoSeedTracks | RecommendationError::InvalidLimit => {
                ErrorClass::BadRequest
            }
            RecommendationError::CacheUnavailable(_) | RecommendationError::Internal(_) => {
                ErrorClass::ServerError
            }
        }
    }
}

impl From<StoreError> for RecommendationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => RecommendationError::CacheUnavailable(e.to_string()),
            StoreError::InvalidTtl(_) => RecommendationError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for RecommendationError {
    fn from(e: serde_json::Error) -> Self {
        RecommendationError::Internal(format!("Serialization error: {}", e))
    }
}

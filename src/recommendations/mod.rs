//! Recommendation orchestration.
//!
//! Turns seed tracks into a growing, paginated list of song
//! recommendations, cached per seed and backed by a text generator with
//! an offline fallback.

pub mod cache;
pub mod engine;
pub mod errors;
pub mod fallback;
pub mod generator;
pub mod parser;
pub mod types;

pub use cache::RecommendationCache;
pub use engine::RecommendationEngine;
pub use errors::{ErrorClass, RecommendationError};
pub use fallback::FallbackRecommender;
pub use generator::{RecommendationGenerator, RetryPolicy};
pub use types::{Page, PageRequest, RecommendationEntry, SeedKey, TimeRange};

pub mod config;
pub mod database;
pub mod gemini;
pub mod metrics;
pub mod recommendations;
pub mod seeds;
pub mod store;

pub use config::Config;
pub use recommendations::{
    Page, PageRequest, RecommendationEngine, RecommendationEntry, RecommendationError, SeedKey,
    TimeRange,
};

//! Data types for the recommendation system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when the generator returns an entry without a usable title.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// A song recommended by the generator (or the offline fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    /// Song title, never empty
    pub song_title: String,
    /// Artist name. Only filled by enrichment outside the engine,
    /// otherwise an empty string.
    #[serde(default)]
    pub artist: String,
}

impl RecommendationEntry {
    /// Entry with an empty artist field.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            song_title: title.into(),
            artist: String::new(),
        }
    }

    /// Identity used for deduplication: the lowercased title.
    pub fn title_key(&self) -> String {
        self.song_title.to_lowercase()
    }
}

/// Identity that partitions cached recommendation state.
///
/// Either a catalog playlist id, or `{user}_top_tracks_{range}` for
/// recommendations seeded from a user's top tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedKey(String);

impl SeedKey {
    pub fn playlist(playlist_id: impl Into<String>) -> Self {
        Self(playlist_id.into())
    }

    pub fn top_tracks(user_id: &str, range: TimeRange) -> Self {
        Self(format!("{}_top_tracks_{}", user_id, range))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top-tracks window offered by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last four weeks
    ShortTerm,
    /// Roughly the last six months
    MediumTerm,
    /// Several years of history
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "short_term" => Ok(TimeRange::ShortTerm),
            "medium_term" => Ok(TimeRange::MediumTerm),
            "long_term" => Ok(TimeRange::LongTerm),
            other => Err(format!("Unknown time range: {}", other)),
        }
    }
}

/// A single page request against the engine.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub seed_key: SeedKey,
    /// Seed tracks as "title by artist" descriptions
    pub seed_tracks: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    /// Optional free-text steering instruction
    pub steering: Option<String>,
    /// Drop the accumulated list before serving (honoured at offset 0 only)
    pub force_clear: bool,
}

impl PageRequest {
    pub fn new(seed_key: SeedKey, seed_tracks: Vec<String>) -> Self {
        Self {
            seed_key,
            seed_tracks,
            limit: 10,
            offset: 0,
            steering: None,
            force_clear: false,
        }
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_steering(mut self, steering: Option<String>) -> Self {
        self.steering = steering;
        self
    }

    pub fn with_force_clear(mut self, force_clear: bool) -> Self {
        self.force_clear = force_clear;
        self
    }
}

/// A slice of the accumulated recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
    /// Length of the accumulated list this page was cut from
    pub total: usize,
    pub entries: Vec<RecommendationEntry>,
}

impl Page {
    /// Cut `[offset, min(offset + limit, len))` out of `list`.
    /// An offset past the end yields an empty page.
    pub fn slice(list: &[RecommendationEntry], offset: usize, limit: usize) -> Self {
        let total = list.len();
        let entries = if offset >= total {
            Vec::new()
        } else {
            let end = offset.saturating_add(limit).min(total);
            list[offset..end].to_vec()
        };

        Self {
            offset,
            limit,
            total,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.song_title.as_str()).collect()
    }
}

/// Trim a steering instruction; blank instructions count as absent.
pub fn normalize_steering(steering: Option<&str>) -> Option<String> {
    steering
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

//! Extraction of song entries from raw generator output.
//!
//! The generator is asked for a JSON array but routinely wraps it in prose,
//! Markdown fences, or ignores the format entirely. Parsing runs as a
//! cascade of decreasing confidence; the first stage that yields at least
//! one entry wins:
//!
//! 1. API envelope: `candidates[0].content.parts[0].text`
//! 2. JSON array found between the first `[` and the last `]`
//! 3. `"song_title": "..."` fields scraped with a regex
//! 4. One title per line, bullets and numbering stripped

use crate::recommendations::types::{RecommendationEntry, UNKNOWN_TITLE};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static SONG_TITLE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""song_title"\s*:\s*"([^"]+)""#).expect("valid regex"));

static NUMBER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid regex"));

static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s*").expect("valid regex"));

/// Longest slice of raw output echoed into the debug log.
const MAX_LOG_CHARS: usize = 500;

/// Parse a raw generator payload. Never fails; an unusable payload
/// yields an empty list.
pub fn parse(raw: &str) -> Vec<RecommendationEntry> {
    log::debug!("Raw generator response: {}", truncate_for_log(raw));

    let inner = envelope_text(raw).unwrap_or_else(|| raw.to_string());
    let text = strip_code_fences(&inner);

    let entries = json_array_entries(&text)
        .or_else(|| regex_entries(&text))
        .or_else(|| line_entries(&text))
        .unwrap_or_default();

    log::debug!("Parsed {} recommendations", entries.len());
    entries
}

/// Stage 1: pull the model's text out of the response envelope.
fn envelope_text(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let text = value
        .as_object()?
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    Some(text.to_string())
}

fn strip_code_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Stage 2: treat the outermost bracketed span as a JSON array of objects.
fn json_array_entries(text: &str) -> Option<Vec<RecommendationEntry>> {
    let candidate = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };

    let items: Vec<Value> = match serde_json::from_str(candidate) {
        Ok(items) => items,
        Err(e) => {
            log::debug!("Inner text is not a JSON array: {}", e);
            return None;
        }
    };

    let entries: Vec<RecommendationEntry> = items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let title = obj
                .get("song_title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(UNKNOWN_TITLE);
            Some(RecommendationEntry::titled(title))
        })
        .collect();

    non_empty(entries)
}

/// Stage 3: scrape `"song_title": "..."` fields out of broken JSON.
fn regex_entries(text: &str) -> Option<Vec<RecommendationEntry>> {
    let entries = SONG_TITLE_FIELD
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
        .map(RecommendationEntry::titled)
        .collect();

    non_empty(entries)
}

/// Stage 4: free text, one title per line.
fn line_entries(text: &str) -> Option<Vec<RecommendationEntry>> {
    let entries = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['{', '[', '}', ']']))
        .map(|line| {
            let line = NUMBER_MARKER.replace(line, "");
            BULLET_MARKER.replace(&line, "").trim().to_string()
        })
        .filter(|title| !title.is_empty())
        .map(RecommendationEntry::titled)
        .collect();

    non_empty(entries)
}

fn non_empty(entries: Vec<RecommendationEntry>) -> Option<Vec<RecommendationEntry>> {
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

fn truncate_for_log(raw: &str) -> String {
    if raw.chars().count() <= MAX_LOG_CHARS {
        return raw.to_string();
    }
    let head: String = raw.chars().take(MAX_LOG_CHARS).collect();
    format!("{}... (truncated, full length: {})", head, raw.len())
}

//! Seed descriptions from catalog JSON.
//!
//! Playlists carry their tracks under `tracks.items[].track`; top-tracks
//! responses list tracks directly under `items[]`. Each track becomes
//! `"<name> by <first artist>"`, or just `"<name>"` without artists.

use serde_json::Value;

/// Seed descriptions from a playlist object.
pub fn descriptions_from_playlist(playlist: &Value) -> Vec<String> {
    let Some(items) = playlist
        .get("tracks")
        .and_then(|t| t.get("items"))
        .and_then(|i| i.as_array())
    else {
        log::warn!("Playlist JSON has no tracks.items array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| item.get("track"))
        .filter_map(describe_track)
        .collect()
}

/// Seed descriptions from a top-tracks response.
pub fn descriptions_from_top_tracks(top_tracks: &Value) -> Vec<String> {
    let Some(items) = top_tracks.get("items").and_then(|i| i.as_array()) else {
        log::warn!("Top tracks JSON has no items array");
        return Vec::new();
    };

    items.iter().filter_map(describe_track).collect()
}

fn describe_track(track: &Value) -> Option<String> {
    let name = track.get("name").and_then(|v| v.as_str())?.trim();
    if name.is_empty() {
        return None;
    }

    let artist = track
        .get("artists")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|a| !a.is_empty());

    Some(match artist {
        Some(artist) => format!("{} by {}", name, artist),
        None => name.to_string(),
    })
}

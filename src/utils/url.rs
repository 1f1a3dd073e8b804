//! URL utilities for validating platform URLs and extracting video IDs

use crate::error::RelayError;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

static VIDEO_ID_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$"));

/// Extract the 11-character video ID from a YouTube URL.
///
/// The ID is taken from the `v` query parameter, falling back to the last
/// path segment (covers `youtu.be/<id>`, `/shorts/<id>`, `/embed/<id>`).
pub fn extract_video_id(url: &str) -> Result<String, RelayError> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| RelayError::InvalidInput(format!("Not a URL: {}", url)))?;

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return Err(RelayError::InvalidInput(
            "Not a supported video platform URL".to_string(),
        ));
    }

    let candidate = parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.to_string())
        .or_else(|| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    let id_pattern = VIDEO_ID_PATTERN
        .as_ref()
        .map_err(|e| RelayError::RegexError(e.clone()))?;
    if id_pattern.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(RelayError::InvalidInput(format!(
            "Missing or malformed video ID: {:?}",
            candidate
        )))
    }
}

/// Canonical watch URL for a YouTube video URL
pub fn clean_youtube_url(url: &str) -> Result<String, RelayError> {
    let video_id = extract_video_id(url)?;
    Ok(format!("https://www.youtube.com/watch?v={}", video_id))
}

/// Check if URL points at Instagram
pub fn is_instagram_url(url: &str) -> bool {
    url.contains("instagram.com")
}

/// Validate an Instagram URL, returning it trimmed
pub fn validate_instagram_url(url: &str) -> Result<String, RelayError> {
    let trimmed = url.trim();
    if !is_instagram_url(trimmed) {
        return Err(RelayError::InvalidInput(
            "Not an Instagram URL".to_string(),
        ));
    }
    Url::parse(trimmed).map_err(|_| RelayError::InvalidInput(format!("Not a URL: {}", trimmed)))?;
    Ok(trimmed.to_string())
}

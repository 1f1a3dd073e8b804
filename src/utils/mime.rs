//! MIME type utilities for containers and response content types

/// Get MIME type from file extension
pub fn mime_from_ext(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        // Video formats
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",

        // Audio formats
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",

        // Images (single-photo posts)
        "jpg" | "jpeg" => "image/jpeg",

        // Default fallback
        _ => "application/octet-stream",
    }
}

/// Container name from a MIME type, e.g. `video/mp4; codecs="avc1"` -> `mp4`
pub fn container_from_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(|subtype| subtype.trim().to_lowercase())
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Check if MIME type is a video format
pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}

/// Check if MIME type is an audio format
pub fn is_audio_mime(mime_type: &str) -> bool {
    mime_type.starts_with("audio/")
}

//! Safe filename generation utilities

/// Default cap on sanitized filename length, in characters
pub const DEFAULT_FILENAME_MAX_LEN: usize = 50;

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace()
}

/// Convert a title to a download filename stem.
///
/// Drops every character that is not an ASCII word character, whitespace or
/// `-`, trims, then caps the result at `max_len` characters.
pub fn sanitize_title(title: &str, max_len: usize) -> String {
    let stripped: String = title.chars().filter(|c| is_kept(*c)).collect();
    stripped.trim().chars().take(max_len).collect()
}

/// Sanitize a title, falling back to `fallback` when nothing survives
pub fn sanitize_or(title: &str, max_len: usize, fallback: &str) -> String {
    let safe = sanitize_title(title, max_len);
    if safe.is_empty() {
        fallback.to_string()
    } else {
        safe
    }
}

/// Build a `Content-Disposition: attachment` value for a filename stem and extension
pub fn attachment_disposition(stem: &str, extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    // The stem only holds word chars, spaces and dashes; collapse the
    // whitespace kinds that are not legal inside a header value.
    let stem: String = stem
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    format!("attachment; filename=\"{}.{}\"", stem, ext)
}

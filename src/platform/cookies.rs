//! Browser cookie file support for the YouTube metadata client

use std::path::Path;

use tracing::{debug, info, warn};

/// Parse cookie file contents into `(name, value)` pairs.
///
/// Two line shapes are accepted: plain `name=value` lines, and Netscape
/// `cookies.txt` rows (7 tab-separated fields) whose domain is YouTube.
pub fn parse_cookies(contents: &str) -> Vec<(String, String)> {
    let mut cookies = Vec::new();

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || (line.starts_with('#') && !line.starts_with("#HttpOnly_")) {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() == 7 {
            let domain = fields[0].trim_start_matches("#HttpOnly_");
            if domain.ends_with("youtube.com") && !fields[5].is_empty() {
                cookies.push((fields[5].to_string(), fields[6].to_string()));
            }
            continue;
        }

        if let Some((name, value)) = line.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.push((name.to_string(), value.trim().to_string()));
            }
        }
    }

    cookies
}

/// Render cookie pairs as a `Cookie` header value
pub fn cookie_header(cookies: &[(String, String)]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Load the cookie file if it exists; a missing or unreadable file means no cookies
pub fn load_cookie_header(path: &Path) -> Option<String> {
    if !path.exists() {
        debug!("No cookie file at {}", path.display());
        return None;
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let cookies = parse_cookies(&contents);
            info!("Loaded {} cookies from {}", cookies.len(), path.display());
            cookie_header(&cookies)
        }
        Err(e) => {
            warn!("Failed to read cookie file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_cookies() {
        let cookies = parse_cookies("SID=abc\n\n  HSID = def==  \nbroken line\n");
        assert_eq!(
            cookies,
            vec![
                ("SID".to_string(), "abc".to_string()),
                ("HSID".to_string(), "def==".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_netscape_cookies() {
        let contents = "# Netscape HTTP Cookie File\n\
            .youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=40000000\n\
            #HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\txyz\n\
            .google.com\tTRUE\t/\tTRUE\t0\tNID\tignored\n";
        let cookies = parse_cookies(contents);
        assert_eq!(
            cookies,
            vec![
                ("PREF".to_string(), "f6=40000000".to_string()),
                ("LOGIN_INFO".to_string(), "xyz".to_string()),
            ]
        );
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header(&[]), None);
        let pairs = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ];
        assert_eq!(cookie_header(&pairs), Some("A=1; B=2".to_string()));
    }

    #[test]
    fn test_load_cookie_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        assert_eq!(load_cookie_header(&path), None);

        std::fs::write(&path, "SID=abc\n").unwrap();
        assert_eq!(load_cookie_header(&path), Some("SID=abc".to_string()));
    }
}

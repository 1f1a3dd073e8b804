//! Metadata resolution: URL validation, upstream lookup, format normalization

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use tracing::{debug, info, warn};

use crate::core::media_info::{MediaInfo, Platform};
use crate::error::RelayError;
use crate::platform::formats::{collapse_instagram_formats, collapse_youtube_formats};
use crate::platform::innertube::YoutubeMetadata;
use crate::platform::ytdlp::YtDlpInfo;
use crate::utils::{extract_video_id, is_instagram_url, sanitize_or, validate_instagram_url};

/// Fallback filename stem for YouTube titles that sanitize to nothing
pub const YOUTUBE_DEFAULT_FILENAME: &str = "media";
/// Fallback filename stem for Instagram posts
pub const INSTAGRAM_DEFAULT_FILENAME: &str = "instagram_media";
/// Title reported for Instagram posts without one
pub const INSTAGRAM_DEFAULT_TITLE: &str = "Instagram Media";

/// Source of YouTube metadata
#[async_trait]
pub trait YoutubeSource: Send + Sync {
    /// Fetch metadata for a validated video id
    async fn fetch(&self, video_id: &str) -> Result<YoutubeMetadata, RelayError>;
}

/// Source of Instagram metadata
#[async_trait]
pub trait InstagramSource: Send + Sync {
    /// Fetch metadata for a validated post URL
    async fn fetch(&self, url: &str) -> Result<YtDlpInfo, RelayError>;
}

/// Metadata resolver
#[derive(Clone)]
pub struct Resolver {
    youtube: Arc<dyn YoutubeSource>,
    instagram: Arc<dyn InstagramSource>,
    filename_max_len: usize,
}

impl Resolver {
    /// Create a new resolver over the given sources
    pub fn new(
        youtube: Arc<dyn YoutubeSource>,
        instagram: Arc<dyn InstagramSource>,
        filename_max_len: usize,
    ) -> Self {
        Self {
            youtube,
            instagram,
            filename_max_len,
        }
    }

    /// Resolve any supported URL, dispatching on the platform
    pub async fn resolve(&self, url: &str) -> Result<MediaInfo, RelayError> {
        if is_instagram_url(url) {
            self.resolve_instagram(url).await
        } else {
            self.resolve_youtube(url).await
        }
    }

    /// Resolve a YouTube URL
    pub async fn resolve_youtube(&self, url: &str) -> Result<MediaInfo, RelayError> {
        let video_id = extract_video_id(url)?;
        info!("Resolving YouTube video {}", video_id);

        let metadata = self.youtube.fetch(&video_id).await.map_err(|e| {
            warn!("YouTube metadata lookup failed for {}: {}", video_id, e);
            upstream(e)
        })?;

        let filename = sanitize_or(
            &metadata.title,
            self.filename_max_len,
            YOUTUBE_DEFAULT_FILENAME,
        );
        let mut media = MediaInfo::new(Platform::YouTube, metadata.title.clone(), filename);
        media.formats = collapse_youtube_formats(&metadata.formats, metadata.length_seconds);
        media.thumbnail = metadata.thumbnail;
        media.duration = metadata.length_seconds;
        media.channel = metadata.author;
        media.views = metadata.view_count;
        media.upload_date = metadata.upload_date.as_deref().map(normalize_upload_date);

        debug!(
            "Resolved {} raw formats into {}",
            metadata.formats.len(),
            media.formats.len()
        );
        Ok(media)
    }

    /// Resolve an Instagram URL
    pub async fn resolve_instagram(&self, url: &str) -> Result<MediaInfo, RelayError> {
        let url = validate_instagram_url(url)?;
        info!("Resolving Instagram post {}", url);

        let info = self.instagram.fetch(&url).await.map_err(|e| {
            warn!("Instagram metadata lookup failed for {}: {}", url, e);
            e
        })?;

        let title = info
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| INSTAGRAM_DEFAULT_TITLE.to_string());
        let filename = sanitize_or(
            info.title.as_deref().unwrap_or_default(),
            self.filename_max_len,
            INSTAGRAM_DEFAULT_FILENAME,
        );

        let mut media = MediaInfo::new(Platform::Instagram, title, filename);
        media.formats = collapse_instagram_formats(&info);
        media.thumbnail = info.thumbnail;
        media.duration = info.duration;
        Ok(media)
    }
}

/// Every YouTube lookup failure is reported as an upstream failure
fn upstream(error: RelayError) -> RelayError {
    match error {
        e @ (RelayError::UpstreamResolution(_) | RelayError::UnparsableResponse(_)) => e,
        other => RelayError::UpstreamResolution(other.to_string()),
    }
}

/// Normalize an upload date to `YYYY-MM-DD`, passing unknown shapes through unchanged
pub fn normalize_upload_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y%m%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return datetime.date_naive().format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::innertube::YoutubeFormat;
    use crate::platform::ytdlp::YtDlpFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeYoutube {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl YoutubeSource for FakeYoutube {
        async fn fetch(&self, video_id: &str) -> Result<YoutubeMetadata, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RelayError::IoError(std::io::Error::other("connection reset")));
            }
            let format = |itag, bitrate| YoutubeFormat {
                itag,
                mime_type: "video/mp4; codecs=\"avc1\"".to_string(),
                quality_label: Some("720p".to_string()),
                bitrate,
                content_length: None,
                audio_quality: None,
            };
            Ok(YoutubeMetadata {
                video_id: video_id.to_string(),
                title: "My/Video: Test?!".to_string(),
                author: Some("Channel".to_string()),
                length_seconds: Some(60.0),
                view_count: Some(42),
                thumbnail: Some("https://i.ytimg.com/x.jpg".to_string()),
                upload_date: Some("2024-03-05T10:00:00-08:00".to_string()),
                formats: vec![format(22, 5000), format(136, 3000)],
            })
        }
    }

    #[derive(Default)]
    struct FakeInstagram {
        calls: AtomicUsize,
        info: YtDlpInfo,
    }

    #[async_trait]
    impl InstagramSource for FakeInstagram {
        async fn fetch(&self, _url: &str) -> Result<YtDlpInfo, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.info.clone())
        }
    }

    fn resolver(youtube: Arc<FakeYoutube>, instagram: Arc<FakeInstagram>) -> Resolver {
        Resolver::new(youtube, instagram, 50)
    }

    #[tokio::test]
    async fn test_same_label_collapses_to_highest_bitrate() {
        let youtube = Arc::new(FakeYoutube::default());
        let resolver = resolver(youtube.clone(), Arc::default());

        let media = resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(youtube.calls.load(Ordering::SeqCst), 1);
        assert_eq!(media.formats.len(), 1);
        assert_eq!(media.formats[0].quality_label, "720p");
        assert_eq!(media.formats[0].bitrate, 5000);
        assert!(media.is_youtube);
        assert_eq!(media.filename, "MyVideo Test");
        assert_eq!(media.channel.as_deref(), Some("Channel"));
        assert_eq!(media.upload_date.as_deref(), Some("2024-03-05"));
        assert_eq!(media.likes, None);
    }

    #[tokio::test]
    async fn test_invalid_urls_never_reach_sources() {
        let youtube = Arc::new(FakeYoutube::default());
        let instagram = Arc::new(FakeInstagram::default());
        let resolver = resolver(youtube.clone(), instagram.clone());

        for url in [
            "",
            "not a url",
            "https://vimeo.com/12345678901",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/",
        ] {
            let err = resolver.resolve_youtube(url).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidInput(_)), "{url}");
        }
        for url in ["https://example.com/p/abc", "instagram.com/p/abc"] {
            let err = resolver.resolve_instagram(url).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidInput(_)), "{url}");
        }

        assert_eq!(youtube.calls.load(Ordering::SeqCst), 0);
        assert_eq!(instagram.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_youtube_failure_is_upstream() {
        let youtube = Arc::new(FakeYoutube {
            fail: true,
            ..Default::default()
        });
        let resolver = resolver(youtube, Arc::default());
        let err = resolver
            .resolve_youtube("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UpstreamResolution(_)));
    }

    #[tokio::test]
    async fn test_instagram_resolution() {
        let instagram = Arc::new(FakeInstagram {
            info: YtDlpInfo {
                title: Some("Beach day ☀️ #summer".to_string()),
                duration: Some(12.0),
                thumbnail: Some("https://cdn.example/t.jpg".to_string()),
                formats: vec![YtDlpFormat {
                    format_id: "dash-720".to_string(),
                    url: Some("https://cdn.example/v".to_string()),
                    vcodec: Some("avc1".to_string()),
                    ext: Some("mp4".to_string()),
                    height: Some(720),
                    filesize: Some(1000),
                    tbr: None,
                }],
                ..Default::default()
            },
            ..Default::default()
        });
        let resolver = resolver(Arc::default(), instagram.clone());

        let media = resolver
            .resolve("https://www.instagram.com/reel/abc123/")
            .await
            .unwrap();

        assert_eq!(instagram.calls.load(Ordering::SeqCst), 1);
        assert!(!media.is_youtube);
        assert_eq!(media.filename, "Beach day  summer");
        assert_eq!(media.formats[0].id, "dash-720");
        assert_eq!(media.duration, Some(12.0));
    }

    #[tokio::test]
    async fn test_instagram_untitled_defaults() {
        let resolver = resolver(Arc::default(), Arc::default());
        let media = resolver
            .resolve_instagram("https://www.instagram.com/p/abc/")
            .await
            .unwrap();
        assert_eq!(media.title, INSTAGRAM_DEFAULT_TITLE);
        assert_eq!(media.filename, INSTAGRAM_DEFAULT_FILENAME);
        assert!(media.formats.is_empty());
    }

    #[test]
    fn test_normalize_upload_date() {
        assert_eq!(normalize_upload_date("2009-10-25"), "2009-10-25");
        assert_eq!(normalize_upload_date("20091025"), "2009-10-25");
        assert_eq!(normalize_upload_date("2009-10-24T23:57:33-07:00"), "2009-10-24");
        assert_eq!(normalize_upload_date("last week"), "last week");
    }
}

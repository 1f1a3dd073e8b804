//! Media information structures

use serde::{Deserialize, Serialize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Supported source platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Instagram,
}

/// Size of a format, exact when the platform reports a byte count
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeInfo {
    /// Exact byte length
    Exact(u64),
    /// Estimated size in megabytes
    Estimated(f64),
    /// Nothing to go on
    Unknown,
}

impl SizeInfo {
    /// Apply the size policy: exact bytes win, then `kbps * seconds / 8192` MB, else unknown.
    pub fn from_parts(
        filesize: Option<u64>,
        bitrate_kbps: Option<f64>,
        duration_secs: Option<f64>,
    ) -> Self {
        match (filesize, bitrate_kbps, duration_secs) {
            (Some(bytes), _, _) if bytes > 0 => SizeInfo::Exact(bytes),
            (_, Some(kbps), Some(secs)) if kbps > 0.0 && secs > 0.0 => {
                SizeInfo::Estimated(kbps * secs / 8192.0)
            }
            _ => SizeInfo::Unknown,
        }
    }

    /// Size in megabytes, if known or estimated
    pub fn megabytes(&self) -> Option<f64> {
        match self {
            SizeInfo::Exact(bytes) => Some(*bytes as f64 / BYTES_PER_MB),
            SizeInfo::Estimated(mb) => Some(*mb),
            SizeInfo::Unknown => None,
        }
    }

    /// Exact byte count, `0` when not exact
    pub fn exact_bytes(&self) -> u64 {
        match self {
            SizeInfo::Exact(bytes) => *bytes,
            _ => 0,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, SizeInfo::Estimated(_))
    }

    /// Human-readable size, e.g. `5.00 MB` or `0.94 MB (Est)`
    pub fn display(&self) -> String {
        match self {
            SizeInfo::Exact(_) => format!("{:.2} MB", self.megabytes().unwrap_or_default()),
            SizeInfo::Estimated(mb) => format!("{:.2} MB (Est)", mb),
            SizeInfo::Unknown => "Unknown".to_string(),
        }
    }
}

/// Normalized format entry returned to clients
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    /// Format id understood by the download endpoint (itag / yt-dlp format_id)
    pub id: String,
    /// Quality label, e.g. `720p`, `Audio Only`
    pub quality_label: String,
    /// Container, e.g. `mp4`
    pub container: String,
    pub is_audio_only: bool,
    pub size: SizeInfo,
    /// Bitrate as reported by the platform
    pub bitrate: u32,
}

impl FormatDescriptor {
    /// Leading integer of the quality label (`1080p60` -> 1080), 0 when there is none
    pub fn quality_rank(&self) -> u32 {
        quality_rank(&self.quality_label)
    }
}

/// Leading integer of a quality label, 0 when the label does not start with a digit
pub fn quality_rank(label: &str) -> u32 {
    let digits: String = label
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatWire<'a> {
    itag: &'a str,
    quality: &'a str,
    container: &'a str,
    is_audio_only: bool,
    size: String,
    size_estimated: bool,
    content_length: u64,
    bitrate: u32,
}

impl Serialize for FormatDescriptor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FormatWire {
            itag: &self.id,
            quality: &self.quality_label,
            container: &self.container,
            is_audio_only: self.is_audio_only,
            size: self.size.display(),
            size_estimated: self.size.is_estimated(),
            content_length: self.size.exact_bytes(),
            bitrate: self.bitrate,
        }
        .serialize(serializer)
    }
}

/// Resolved media information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub success: bool,
    /// Media title
    pub title: String,
    /// Sanitized filename stem derived from the title
    pub filename: String,
    /// Collapsed and sorted formats
    pub formats: Vec<FormatDescriptor>,
    #[serde(rename = "isYouTube")]
    pub is_youtube: bool,
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

impl MediaInfo {
    /// Create a new MediaInfo
    pub fn new(platform: Platform, title: String, filename: String) -> Self {
        Self {
            success: true,
            title,
            filename,
            formats: Vec::new(),
            is_youtube: platform == Platform::YouTube,
            thumbnail: None,
            duration: None,
            channel: None,
            views: None,
            likes: None,
            upload_date: None,
        }
    }
}

/// What a download request should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// Extract audio and transcode to mp3 (temp file)
    Audio,
    /// YouTube video of a given height remuxed to mp4 (direct pipe)
    Video { height: u32 },
    /// Instagram media by format id (temp file)
    GenericMedia,
}

impl DownloadKind {
    /// Extension of the delivered file
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadKind::Audio => "mp3",
            DownloadKind::Video { .. } | DownloadKind::GenericMedia => "mp4",
        }
    }

    /// Content type of the delivered file
    pub fn content_type(&self) -> &'static str {
        crate::utils::mime::mime_from_ext(self.extension())
    }
}

/// A validated download request
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source URL handed to the tool
    pub url: String,
    /// Format id for generic media (`best` when not selected)
    pub format_id: String,
    pub kind: DownloadKind,
    /// Sanitized filename stem, including any quality suffix
    pub filename: String,
}

//! Format collapsing and ordering
//!
//! Both platforms report many near-identical formats. Clients get one entry per
//! quality key, the strongest candidate for that key, ordered by descending
//! numeric quality.

use std::collections::HashMap;

use crate::core::media_info::{FormatDescriptor, SizeInfo};
use crate::platform::innertube::YoutubeFormat;
use crate::platform::ytdlp::YtDlpInfo;
use crate::utils::mime::{container_from_mime, is_audio_mime, is_video_mime};

/// Label given to YouTube formats without a video track
pub const AUDIO_ONLY_LABEL: &str = "Audio Only";

/// Keep one descriptor per key. A later candidate replaces the kept one only
/// when `replaces(candidate, kept)` holds; insertion order of keys is preserved.
fn collapse_by_key<I, F>(candidates: I, replaces: F) -> Vec<FormatDescriptor>
where
    I: IntoIterator<Item = (String, FormatDescriptor)>,
    F: Fn(&FormatDescriptor, &FormatDescriptor) -> bool,
{
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<FormatDescriptor> = Vec::new();

    for (key, candidate) in candidates {
        match slots.get(&key) {
            Some(&index) => {
                if replaces(&candidate, &kept[index]) {
                    kept[index] = candidate;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(candidate);
            }
        }
    }

    kept
}

/// Sort formats by quality (best first). Stable, so equal ranks keep their order.
pub fn sort_by_quality(formats: &mut [FormatDescriptor]) {
    formats.sort_by(|a, b| b.quality_rank().cmp(&a.quality_rank()));
}

/// Collapse YouTube formats by quality label, keeping the highest bitrate per label
pub fn collapse_youtube_formats(
    formats: &[YoutubeFormat],
    duration_secs: Option<f64>,
) -> Vec<FormatDescriptor> {
    let candidates = formats
        .iter()
        .filter(|f| f.has_video() || f.has_audio())
        .map(|f| {
            let label = f
                .quality_label
                .clone()
                .filter(|label| !label.is_empty() && f.has_video())
                .unwrap_or_else(|| AUDIO_ONLY_LABEL.to_string());
            let bitrate_kbps = (f.bitrate > 0).then(|| f64::from(f.bitrate) / 1000.0);
            let descriptor = FormatDescriptor {
                id: f.itag.to_string(),
                quality_label: label.clone(),
                container: container_from_mime(&f.mime_type),
                is_audio_only: !f.has_video() && f.has_audio(),
                size: SizeInfo::from_parts(f.content_length, bitrate_kbps, duration_secs),
                bitrate: f.bitrate,
            };
            (label, descriptor)
        });

    let mut collapsed = collapse_by_key(candidates, |candidate, kept| {
        candidate.bitrate > kept.bitrate
    });
    sort_by_quality(&mut collapsed);
    collapsed
}

/// Collapse Instagram formats by `label-ext`, keeping the largest known filesize per key.
///
/// When no video-capable format survives but the post itself carries a media
/// URL, a single `best` descriptor is synthesized from the top-level metadata.
pub fn collapse_instagram_formats(info: &YtDlpInfo) -> Vec<FormatDescriptor> {
    let duration = info.duration.filter(|d| *d > 0.0);

    let candidates = info
        .formats
        .iter()
        .filter(|f| f.url.is_some() && f.has_video())
        .map(|f| {
            let label = match f.height {
                Some(height) if height > 0 => format!("{}p", height),
                _ => "Original".to_string(),
            };
            let ext = f.ext.clone().unwrap_or_default();
            let key = format!("{}-{}", label, ext);
            let tbr = f.tbr.filter(|t| *t > 0.0);
            let descriptor = FormatDescriptor {
                id: f.format_id.clone(),
                quality_label: label,
                container: ext,
                is_audio_only: false,
                size: SizeInfo::from_parts(f.filesize, tbr, duration),
                bitrate: tbr.map(|t| t.round() as u32).unwrap_or(0),
            };
            (key, descriptor)
        });

    let mut collapsed = collapse_by_key(candidates, |candidate, kept| {
        candidate.size.exact_bytes() > kept.size.exact_bytes()
    });
    sort_by_quality(&mut collapsed);

    if collapsed.is_empty() && (info.url.is_some() || info.display_url.is_some()) {
        let quality_label = match (info.width, info.height) {
            (Some(width), Some(height)) => format!("{}x{} (Media)", width, height),
            _ => "Original (Media)".to_string(),
        };
        collapsed.push(FormatDescriptor {
            id: "best".to_string(),
            quality_label,
            container: info.ext.clone().unwrap_or_else(|| "jpg/mp4".to_string()),
            is_audio_only: false,
            size: SizeInfo::from_parts(info.filesize, None, None),
            bitrate: 0,
        });
    }

    collapsed
}

impl YoutubeFormat {
    /// Whether the format carries a video track
    pub fn has_video(&self) -> bool {
        is_video_mime(&self.mime_type)
    }

    /// Whether the format carries an audio track
    pub fn has_audio(&self) -> bool {
        is_audio_mime(&self.mime_type) || self.audio_quality.is_some()
    }
}

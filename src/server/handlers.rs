//! Route handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::media_info::{DownloadKind, DownloadRequest, MediaInfo};
use crate::core::resolver::{INSTAGRAM_DEFAULT_FILENAME, YOUTUBE_DEFAULT_FILENAME};
use crate::download::RelayResponse;
use crate::server::response::ApiError;
use crate::server::AppState;
use crate::error::RelayError;
use crate::utils::{
    clean_youtube_url, is_instagram_url, sanitize_or, sanitize_title, validate_instagram_url,
};

#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YoutubeDownloadQuery {
    pub url: Option<String>,
    /// `audio`, anything else means video
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// e.g. `720p`
    pub quality: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstagramDownloadQuery {
    pub url: Option<String>,
    pub itag: Option<String>,
    pub filename: Option<String>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /get-video-info?url=`
pub async fn get_video_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<MediaInfo>, ApiError> {
    let url = query.url.unwrap_or_default();
    if is_instagram_url(&url) {
        return Err(ApiError::youtube_info(&RelayError::InvalidInput(
            "Not a YouTube URL".to_string(),
        )));
    }
    state
        .resolver
        .resolve(&url)
        .await
        .map(Json)
        .map_err(|e| ApiError::youtube_info(&e))
}

/// `GET /get-insta-info?url=`
pub async fn get_insta_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<MediaInfo>, ApiError> {
    let url = query.url.unwrap_or_default();
    if !is_instagram_url(&url) {
        return Err(ApiError::instagram_info(&RelayError::InvalidInput(
            "Not an Instagram URL".to_string(),
        )));
    }
    state
        .resolver
        .resolve(&url)
        .await
        .map(Json)
        .map_err(|e| ApiError::instagram_info(&e))
}

/// `GET /download-youtube-stream?url=&type=&quality=&filename=`
pub async fn download_youtube_stream(
    State(state): State<AppState>,
    Query(query): Query<YoutubeDownloadQuery>,
) -> Result<RelayResponse, ApiError> {
    let url = required_url(query.url)?;
    let url = clean_youtube_url(&url)
        .map_err(|_| ApiError::text(StatusCode::BAD_REQUEST, "Invalid YouTube URL"))?;
    let stem = sanitize_or(
        query.filename.as_deref().unwrap_or_default(),
        state.filename_max_len,
        YOUTUBE_DEFAULT_FILENAME,
    );

    let request = if query.kind.as_deref() == Some("audio") {
        DownloadRequest {
            url,
            format_id: "bestaudio".to_string(),
            kind: DownloadKind::Audio,
            filename: stem,
        }
    } else {
        let quality = query.quality.unwrap_or_default();
        let height = parse_height(&quality)
            .ok_or_else(|| ApiError::text(StatusCode::BAD_REQUEST, "Invalid quality"))?;
        DownloadRequest {
            url,
            format_id: quality.clone(),
            kind: DownloadKind::Video { height },
            filename: format!("{}_{}", stem, sanitize_title(&quality, 16)),
        }
    };

    run_download(&state, request).await
}

/// `GET /download-instagram-stream?url=&itag=&filename=`
pub async fn download_instagram_stream(
    State(state): State<AppState>,
    Query(query): Query<InstagramDownloadQuery>,
) -> Result<RelayResponse, ApiError> {
    let url = required_url(query.url)?;
    let url = validate_instagram_url(&url)
        .map_err(|_| ApiError::text(StatusCode::BAD_REQUEST, "Invalid Instagram URL"))?;

    let format_id = query
        .itag
        .filter(|itag| !itag.is_empty())
        .unwrap_or_else(|| "best".to_string());
    if !is_valid_format_id(&format_id) {
        return Err(ApiError::text(StatusCode::BAD_REQUEST, "Invalid format id"));
    }

    let request = DownloadRequest {
        url,
        format_id,
        kind: DownloadKind::GenericMedia,
        filename: sanitize_or(
            query.filename.as_deref().unwrap_or_default(),
            state.filename_max_len,
            INSTAGRAM_DEFAULT_FILENAME,
        ),
    };

    run_download(&state, request).await
}

async fn run_download(
    state: &AppState,
    request: DownloadRequest,
) -> Result<RelayResponse, ApiError> {
    match state.coordinator.download(&request).await {
        Ok(response) => {
            info!("Streaming {} to client", request.filename);
            Ok(response)
        }
        Err(e) => {
            warn!("Download of {} failed: {}", request.url, e);
            Err(ApiError::download(&e, request.kind))
        }
    }
}

fn required_url(url: Option<String>) -> Result<String, ApiError> {
    url.map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::text(StatusCode::BAD_REQUEST, "URL missing"))
}

/// Height of a quality label such as `720p` or `1080p60`
pub fn parse_height(quality: &str) -> Option<u32> {
    let digits = quality.len() - quality.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || !quality[digits..].starts_with('p') {
        return None;
    }
    quality[..digits].parse().ok().filter(|height| *height > 0)
}

/// `best`, or a yt-dlp format id made of word characters and dashes
pub fn is_valid_format_id(format_id: &str) -> bool {
    format_id == "best"
        || (!format_id.is_empty()
            && format_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

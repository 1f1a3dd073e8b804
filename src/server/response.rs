//! Mapping results onto HTTP responses

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core::media_info::DownloadKind;
use crate::download::RelayResponse;
use crate::error::RelayError;

/// Request-boundary error with a fixed public message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    json: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    /// Error answered as `{ "error": message }`
    pub fn json(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            json: true,
        }
    }

    /// Error answered as plain text
    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            json: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Failure of `/get-video-info`
    pub fn youtube_info(error: &RelayError) -> Self {
        match error {
            RelayError::InvalidInput(_) | RelayError::UrlError(_) => {
                Self::json(StatusCode::BAD_REQUEST, "Invalid YouTube URL")
            }
            _ => Self::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "YouTube blocked request or login required.",
            ),
        }
    }

    /// Failure of `/get-insta-info`
    pub fn instagram_info(error: &RelayError) -> Self {
        match error {
            RelayError::InvalidInput(_) | RelayError::UrlError(_) => {
                Self::json(StatusCode::BAD_REQUEST, "Invalid Instagram URL")
            }
            RelayError::UnparsableResponse(_) | RelayError::JsonError(_) => Self::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing Instagram data.",
            ),
            _ => Self::json(
                status_of(error),
                "Failed to fetch Instagram info. Post might be private or URL is invalid.",
            ),
        }
    }

    /// Failure of a download endpoint, before any byte was sent
    pub fn download(error: &RelayError, kind: DownloadKind) -> Self {
        let message = match error {
            RelayError::InvalidInput(message) => message.as_str(),
            RelayError::ArtifactCreation(_) => "Server error during file creation",
            RelayError::ProcessSpawn { .. } => "Download failed (yt-dlp failed to start)",
            RelayError::ProcessExecution { .. } if kind == DownloadKind::Audio => {
                "Audio extraction failed"
            }
            RelayError::Stream(_) | RelayError::IoError(_) => "File processing failed on server.",
            RelayError::Timeout(_) => "Download timed out",
            _ => "Download failed (yt-dlp process error)",
        };
        Self::text(status_of(error), message)
    }
}

fn status_of(error: &RelayError) -> StatusCode {
    StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.json {
            (self.status, Json(ErrorBody { error: self.message })).into_response()
        } else {
            (self.status, self.message).into_response()
        }
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let mut response = Body::from_stream(self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Ok(value) = HeaderValue::from_str(&self.disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        if let Some(length) = self.content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_json_error_body() {
        let response = ApiError::youtube_info(&RelayError::InvalidInput("bad".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid YouTube URL");
    }

    #[tokio::test]
    async fn test_text_error_body() {
        let error = RelayError::ProcessExecution {
            code: Some(1),
            detail: "ERROR: secret internal detail".into(),
        };
        let response = ApiError::download(&error, DownloadKind::GenericMedia).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Download failed (yt-dlp process error)");
    }

    #[test]
    fn test_public_messages() {
        let upstream = RelayError::UpstreamResolution("LOGIN_REQUIRED".into());
        assert_eq!(
            ApiError::youtube_info(&upstream).message(),
            "YouTube blocked request or login required."
        );
        assert_eq!(
            ApiError::instagram_info(&RelayError::UnparsableResponse("x".into())).message(),
            "Error processing Instagram data."
        );
        assert_eq!(
            ApiError::instagram_info(&upstream).message(),
            "Failed to fetch Instagram info. Post might be private or URL is invalid."
        );

        let timeout = ApiError::download(&RelayError::Timeout("x".into()), DownloadKind::Audio);
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ApiError::download(
                &RelayError::ProcessExecution { code: Some(1), detail: String::new() },
                DownloadKind::Audio
            )
            .message(),
            "Audio extraction failed"
        );
        assert_eq!(
            ApiError::download(&RelayError::ArtifactCreation("x".into()), DownloadKind::Audio)
                .message(),
            "Server error during file creation"
        );
    }

    #[tokio::test]
    async fn test_relay_response_headers() {
        let relay = RelayResponse {
            content_type: "video/mp4",
            disposition: "attachment; filename=\"clip.mp4\"".to_string(),
            content_length: Some(4),
            body: futures::StreamExt::boxed(futures::stream::iter(vec![Ok(
                bytes::Bytes::from_static(b"data"),
            )])),
        };
        let response = relay.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[CONTENT_LENGTH], "4");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"clip.mp4\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"data");
    }
}

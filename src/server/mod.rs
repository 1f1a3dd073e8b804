//! HTTP surface

pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::config::RelayConfig;
use crate::core::resolver::Resolver;
use crate::download::DownloadCoordinator;
use crate::error::RelayError;
use crate::platform::client::{HttpClientConfig, VideoClient};
use crate::platform::cookies::load_cookie_header;
use crate::platform::innertube::InnerTubeClient;
use crate::platform::ytdlp::YtDlp;

pub use response::ApiError;

/// Shared handler state. Requests share no mutable state.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
    pub coordinator: DownloadCoordinator,
    pub filename_max_len: usize,
}

impl AppState {
    /// Wire the real collaborators from configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let cookie_header = config.cookies_file.as_deref().and_then(load_cookie_header);
        let http_client = VideoClient::with_config(HttpClientConfig {
            timeout: config.info_timeout,
            user_agent: config.user_agent.clone(),
            proxy_url: config.proxy.clone(),
            cookie_header,
        })?;

        let youtube = Arc::new(InnerTubeClient::new(http_client));
        let instagram = Arc::new(YtDlp::from_config(config));

        Ok(Self {
            resolver: Resolver::new(youtube, instagram, config.filename_max_len),
            coordinator: DownloadCoordinator::from_config(config),
            filename_max_len: config.filename_max_len,
        })
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get-video-info", get(handlers::get_video_info))
        .route("/get-insta-info", get(handlers::get_insta_info))
        .route("/download-youtube-stream", get(handlers::download_youtube_stream))
        .route("/download-instagram-stream", get(handlers::download_instagram_stream))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until Ctrl-C, then drain in-flight requests
pub async fn serve(config: &RelayConfig, state: AppState) -> Result<(), RelayError> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Backend running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

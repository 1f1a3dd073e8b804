//! HTTP client for video platform API requests

use crate::error::RelayError;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Android user agent, matching the InnerTube ANDROID client
pub const ANDROID_USER_AGENT: &str =
    "com.google.android.youtube/20.10.38 (Linux; U; Android 11) gzip";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: Option<String>,
    /// Proxy URL
    pub proxy_url: Option<String>,
    /// Cookie header sent with every request
    pub cookie_header: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            proxy_url: None,
            cookie_header: None,
        }
    }
}

/// Platform HTTP client
#[derive(Debug, Clone)]
pub struct VideoClient {
    client: Client,
    config: HttpClientConfig,
}

impl VideoClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self, RelayError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, RelayError> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(
                config
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| ANDROID_USER_AGENT.to_string()),
            );

        if let Some(proxy_url) = &config.proxy_url {
            match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!("Ignoring invalid proxy URL {}: {}", proxy_url, e),
            }
        }

        let client = builder.build()?;
        Ok(Self { client, config })
    }

    /// Get configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Create a JSON POST request, carrying the configured cookies
    pub fn create_json_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept-Language", "en-US,en;q=0.9");

        if let Some(cookie) = &self.config.cookie_header {
            request = request.header("Cookie", cookie);
        }

        request
    }

    /// Execute a request once and decode the JSON body.
    ///
    /// There is no retry: a failed resolution is reported to the caller as is.
    pub async fn execute_json<T>(&self, request: reqwest::RequestBuilder) -> Result<T, RelayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!("HTTP request successful");
            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|e| RelayError::UnparsableResponse(e.to_string()));
        }

        warn!("HTTP request failed with status: {}", status);
        Err(match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                RelayError::UpstreamResolution(format!("request blocked ({})", status))
            }
            StatusCode::NOT_FOUND => {
                RelayError::UpstreamResolution("video unavailable (404)".to_string())
            }
            _ => RelayError::UpstreamResolution(format!("unexpected status {}", status)),
        })
    }
}

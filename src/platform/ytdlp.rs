//! yt-dlp invocation: argument plans, info extraction, and the Instagram source

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::core::config::{RelayConfig, ToolCommand};
use crate::core::resolver::InstagramSource;
use crate::error::RelayError;

/// Format selector used when the caller asks for `best`
pub const BEST_MEDIA_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";

/// A format entry from `--dump-json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: String,
    pub url: Option<String>,
    pub vcodec: Option<String>,
    pub ext: Option<String>,
    pub height: Option<u32>,
    pub filesize: Option<u64>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
}

impl YtDlpFormat {
    /// Whether the format carries a real video codec
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|codec| codec != "none")
    }
}

/// Top-level `--dump-json` output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpInfo {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
    pub display_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ext: Option<String>,
    pub filesize: Option<u64>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

/// yt-dlp wrapper
#[derive(Debug, Clone)]
pub struct YtDlp {
    tool: ToolCommand,
    ffmpeg_location: String,
    cookies_from_browser: Option<String>,
    info_timeout: Duration,
}

impl YtDlp {
    /// Create a wrapper for the given tool command
    pub fn new(tool: ToolCommand, ffmpeg_location: impl Into<String>) -> Self {
        Self {
            tool,
            ffmpeg_location: ffmpeg_location.into(),
            cookies_from_browser: None,
            info_timeout: Duration::from_secs(180),
        }
    }

    /// Create a wrapper from service configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.yt_dlp.clone(), config.ffmpeg_location.clone())
            .with_cookies_from_browser(config.cookies_from_browser.clone())
            .with_info_timeout(config.info_timeout)
    }

    /// Read cookies from a browser during audio extraction
    pub fn with_cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    /// Bound on info extraction
    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    /// Printable tool name
    pub fn program_name(&self) -> String {
        self.tool.display_name()
    }

    /// Arguments extracting audio to mp3 at the best quality
    pub fn audio_args(&self, url: &str, output: &Path) -> Vec<String> {
        let mut args = strings(&[
            "-f",
            "bestaudio",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "0",
        ]);
        if let Some(browser) = &self.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }
        args.extend(strings(&["--ffmpeg-location", &self.ffmpeg_location]));
        args.push("--force-overwrites".to_string());
        args.extend(output_and_url(&output.to_string_lossy(), url));
        args
    }

    /// Arguments streaming a video of the given height, remuxed to mp4, to stdout
    pub fn video_args(&self, url: &str, height: u32) -> Vec<String> {
        let selector = format!("bestvideo[height={}]+bestaudio", height);
        let mut args = strings(&[
            "-f",
            &selector,
            "--recode-video",
            "mp4",
            "--ffmpeg-location",
            &self.ffmpeg_location,
        ]);
        args.extend(output_and_url("-", url));
        args
    }

    /// Arguments downloading generic media by format id, remuxed to mp4
    pub fn media_args(&self, url: &str, format_id: &str, output: &Path) -> Vec<String> {
        let selector = if format_id == "best" {
            BEST_MEDIA_SELECTOR.to_string()
        } else {
            format!("{}+bestaudio", format_id)
        };
        let mut args = strings(&[
            "-f",
            &selector,
            "--ffmpeg-location",
            &self.ffmpeg_location,
            "--postprocessor-args",
            "FFmpegVideoRemuxer:-c copy",
            "--recode-video",
            "mp4",
            "--force-overwrites",
        ]);
        args.extend(output_and_url(&output.to_string_lossy(), url));
        args
    }

    /// Arguments dumping metadata as JSON
    pub fn info_args(&self, url: &str) -> Vec<String> {
        let mut args = strings(&["--dump-json", "--no-check-certificates"]);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Build a command for the tool with the given generated arguments
    pub fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.tool.program);
        cmd.args(&self.tool.prefix_args).args(args);
        cmd
    }

    /// Run `--dump-json` and parse the result
    pub async fn dump_json(&self, url: &str) -> Result<YtDlpInfo, RelayError> {
        info!("Extracting info with {} for {}", self.program_name(), url);

        let mut cmd = self.command(&self.info_args(url));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.info_timeout, cmd.output())
            .await
            .map_err(|_| {
                RelayError::Timeout(format!(
                    "info extraction exceeded {}",
                    humantime::format_duration(self.info_timeout)
                ))
            })?
            .map_err(|source| RelayError::ProcessSpawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output")
                .to_string();
            error!("yt-dlp info extraction failed: {}", detail);
            return Err(RelayError::UpstreamResolution(detail));
        }

        debug!("yt-dlp produced {} bytes of JSON", output.stdout.len());
        serde_json::from_slice(&output.stdout)
            .map_err(|e| RelayError::UnparsableResponse(e.to_string()))
    }
}

#[async_trait]
impl InstagramSource for YtDlp {
    async fn fetch(&self, url: &str) -> Result<YtDlpInfo, RelayError> {
        self.dump_json(url).await
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// `-o <output> -- <url>`; the separator keeps the URL from being read as an option
fn output_and_url(output: &str, url: &str) -> Vec<String> {
    strings(&["-o", output, "--", url])
}

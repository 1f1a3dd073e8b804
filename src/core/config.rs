//! Runtime configuration shared by the resolver, coordinator and sweeper

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::DEFAULT_FILENAME_MAX_LEN;

/// Prefix of every transient artifact file name
pub const ARTIFACT_PREFIX: &str = "media-relay-";

/// Command used to launch an external tool, e.g. `yt-dlp` or `python3 -m yt_dlp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable
    pub program: PathBuf,
    /// Arguments placed before the generated ones
    pub prefix_args: Vec<String>,
}

impl ToolCommand {
    /// Create a command for a bare executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Add arguments placed before the generated ones
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Parse a whitespace-separated command line
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_prefix_args(parts))
    }

    /// Printable program name for logs and errors
    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Main service configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Extraction tool
    pub yt_dlp: ToolCommand,
    /// Media-processing binary handed to the tool for remuxing
    pub ffmpeg_location: String,
    /// Cookie file feeding the YouTube metadata client, if present
    pub cookies_file: Option<PathBuf>,
    /// Browser the tool reads cookies from for audio extraction
    pub cookies_from_browser: Option<String>,
    /// Directory transient artifacts are created in
    pub temp_dir: PathBuf,
    /// Upper bound on an artifact's lifetime
    pub fallback_cleanup: Duration,
    /// Period of the stale-file sweep
    pub sweep_interval: Duration,
    /// Directory scanned for auxiliary leftovers
    pub sweep_dir: PathBuf,
    /// Glob patterns of auxiliary leftovers
    pub sweep_patterns: Vec<String>,
    /// Bound on metadata extraction (HTTP and subprocess)
    pub info_timeout: Duration,
    /// Maximum filename length, in characters
    pub filename_max_len: usize,
    /// Override User-Agent header
    pub user_agent: Option<String>,
    /// Proxy URL (http/https/socks)
    pub proxy: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            yt_dlp: ToolCommand::new("yt-dlp"),
            ffmpeg_location: "ffmpeg".to_string(),
            cookies_file: Some(PathBuf::from("./cookies.txt")),
            cookies_from_browser: None,
            temp_dir: std::env::temp_dir(),
            fallback_cleanup: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            sweep_dir: PathBuf::from("."),
            sweep_patterns: vec!["*-player-script.js".to_string()],
            info_timeout: Duration::from_secs(180),
            filename_max_len: DEFAULT_FILENAME_MAX_LEN,
            user_agent: None,
            proxy: None,
        }
    }
}

impl RelayConfig {
    /// Age after which an orphaned artifact file is certainly not owned by a live request
    pub fn stale_artifact_age(&self) -> Duration {
        self.fallback_cleanup * 2
    }
}

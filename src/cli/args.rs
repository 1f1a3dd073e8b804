//! Command line argument parsing

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::core::config::{RelayConfig, ToolCommand};

/// Media relay - resolves and streams YouTube/Instagram media through yt-dlp
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "MEDIA_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "MEDIA_RELAY_PORT", default_value = "4000")]
    pub port: u16,

    /// Extraction tool command line (e.g. 'yt-dlp', 'python3 -m yt_dlp')
    #[arg(long = "yt-dlp", env = "MEDIA_RELAY_YT_DLP", value_name = "COMMAND", default_value = "yt-dlp")]
    pub yt_dlp: String,

    /// ffmpeg binary or directory handed to the tool
    #[arg(long, env = "MEDIA_RELAY_FFMPEG", value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Cookie file for YouTube metadata requests, used if it exists [default: ./cookies.txt].
    /// An empty value disables cookies.
    #[arg(long, env = "MEDIA_RELAY_COOKIES_FILE", value_name = "PATH")]
    pub cookies_file: Option<String>,

    /// Send no cookies with YouTube metadata requests
    #[arg(long, conflicts_with = "cookies_file")]
    pub no_cookies: bool,

    /// Browser the tool reads cookies from during audio extraction
    #[arg(long, env = "MEDIA_RELAY_COOKIES_FROM_BROWSER", value_name = "BROWSER")]
    pub cookies_from_browser: Option<String>,

    /// Directory for transient download files (defaults to the OS temp dir)
    #[arg(long, env = "MEDIA_RELAY_TEMP_DIR", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Upper bound on a transient file's lifetime (e.g., 30m)
    #[arg(long, env = "MEDIA_RELAY_FALLBACK_CLEANUP", value_name = "DURATION", default_value = "30m")]
    pub fallback_cleanup: humantime::Duration,

    /// Interval of the stale-file sweep (e.g., 10m)
    #[arg(long, env = "MEDIA_RELAY_SWEEP_INTERVAL", value_name = "DURATION", default_value = "10m")]
    pub sweep_interval: humantime::Duration,

    /// Directory scanned for tool leftovers
    #[arg(long, env = "MEDIA_RELAY_SWEEP_DIR", value_name = "DIR", default_value = ".")]
    pub sweep_dir: PathBuf,

    /// Glob of tool leftovers to delete (repeatable)
    #[arg(
        long = "sweep-pattern",
        env = "MEDIA_RELAY_SWEEP_PATTERNS",
        value_name = "GLOB",
        value_delimiter = ',',
        default_value = "*-player-script.js"
    )]
    pub sweep_patterns: Vec<String>,

    /// Bound on metadata extraction (e.g., 3m)
    #[arg(long, env = "MEDIA_RELAY_INFO_TIMEOUT", value_name = "DURATION", default_value = "3m")]
    pub info_timeout: humantime::Duration,

    /// Maximum length of generated filenames
    #[arg(long, env = "MEDIA_RELAY_FILENAME_MAX_LEN", default_value = "50")]
    pub filename_max_len: usize,

    /// Override User-Agent header
    #[arg(long, env = "MEDIA_RELAY_USER_AGENT", value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL (http/https/socks)
    #[arg(long, env = "MEDIA_RELAY_PROXY", value_name = "URL")]
    pub proxy: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only warnings and errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Convert into service configuration
    pub fn into_config(self) -> RelayConfig {
        let defaults = RelayConfig::default();
        let cookies_file = match self.cookies_file {
            _ if self.no_cookies => None,
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => defaults.cookies_file,
        };

        RelayConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            yt_dlp: ToolCommand::parse(&self.yt_dlp).unwrap_or(defaults.yt_dlp),
            ffmpeg_location: self.ffmpeg,
            cookies_file,
            cookies_from_browser: self.cookies_from_browser.filter(|b| !b.is_empty()),
            temp_dir: self.temp_dir.unwrap_or(defaults.temp_dir),
            fallback_cleanup: self.fallback_cleanup.into(),
            sweep_interval: self.sweep_interval.into(),
            sweep_dir: self.sweep_dir,
            sweep_patterns: self.sweep_patterns,
            info_timeout: self.info_timeout.into(),
            filename_max_len: self.filename_max_len.max(1),
            user_agent: self.user_agent,
            proxy: self.proxy,
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (warnings and errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl VerbosityLevel {
    /// Default log filter when `RUST_LOG` is not set
    pub fn default_filter(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "warn",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

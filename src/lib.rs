//! # media-relay
//!
//! HTTP relay that resolves YouTube and Instagram links into metadata and
//! streams the media itself back to the caller through yt-dlp.
//!
//! ## Features
//!
//! - Metadata lookup over the InnerTube player API (YouTube) and yt-dlp (Instagram)
//! - Best-format selection per requested height
//! - Piped video downloads and file-backed audio/media downloads
//! - Guaranteed removal of transient files, with a periodic stale-file sweep
//!
//! ## Example
//!
//! ```rust,no_run
//! use media_relay::{AppState, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::default();
//!     let state = AppState::from_config(&config)?;
//!     media_relay::server::serve(&config, state).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod download;
pub mod error;
pub mod platform;
pub mod server;
pub mod utils;

// Re-export main types
pub use core::{MediaInfo, RelayConfig, Resolver};
pub use download::{DownloadCoordinator, SweepConfig, Sweeper};
pub use error::RelayError;
pub use server::AppState;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

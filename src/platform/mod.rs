//! Platform collaborators: the InnerTube client, yt-dlp, and format normalization

pub mod client;
pub mod cookies;
pub mod formats;
pub mod innertube;
pub mod ytdlp;

pub use client::*;
pub use formats::*;
pub use innertube::*;
pub use ytdlp::*;

//! Utility functions for media-relay

pub mod filename;
pub mod mime;
pub mod url;

pub use filename::*;
pub use mime::*;
pub use url::*;

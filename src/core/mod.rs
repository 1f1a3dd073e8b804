//! Core types for media-relay: configuration, media model, and the resolver

pub mod config;
pub mod media_info;
pub mod resolver;

pub use config::*;
pub use media_info::*;
pub use resolver::*;

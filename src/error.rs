//! Error types for the engine.
//!
//! Fetch errors never reach the renderer: the cache retries or gives up on a
//! tier and keeps drawing whatever it already has.

use thiserror::Error;

/// Failure to fetch or decode an image.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failure to load or validate an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

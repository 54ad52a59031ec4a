//! Server runtime error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be resolved while assembling a build.
    #[error("configuration error: {0}")]
    Config(#[from] tatami_config::ConfigError),

    /// A template failed to render.
    #[error("template \"{name}\" failed: {reason}")]
    Template { name: String, reason: String },

    /// Expirable cache presets only accept `public` or `private` overrides.
    #[error("cache mode must be either 'public' or 'private'")]
    InvalidCacheMode,

    /// Manifest artifact or template source could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest artifact could not be parsed.
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

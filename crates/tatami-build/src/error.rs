//! Build pipeline error types.

use thiserror::Error;

/// Errors surfaced by the bundle pipeline and watcher.
///
/// Inside the watch loop nothing propagates past a cycle boundary; every
/// failure funnels into the supplied failure callback and the previous good
/// artifact keeps serving.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration reload failed during a watch cycle.
    #[error("configuration error: {0}")]
    Config(#[from] tatami_config::ConfigError),

    /// The underlying bundler reported a failure.
    #[error("bundle failed: {0}")]
    Bundler(String),

    /// A virtual module specifier could not be loaded.
    #[error("virtual module \"{0}\" failed to load: {1}")]
    VirtualModule(String, String),

    /// Filesystem watcher failure.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Serialization failure while emitting the asset manifest.
    #[error("manifest serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while reading inputs or writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for build operations.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

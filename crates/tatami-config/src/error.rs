//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving a project configuration.
///
/// All of these abort startup; the build pipeline never runs against a
/// partially resolved config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read or parsed.
    #[error("error reading Tatami config in \"{}\": {reason}", .path.display())]
    Unreadable {
        /// Path of the offending config file.
        path: PathBuf,
        /// Underlying parse or read failure.
        reason: String,
    },

    /// A required entry file was not found next to the source directory.
    #[error("cannot find file \"{basename}\" in {}", .root.display())]
    EntryNotFound {
        /// Entry basename that was probed (extensions tried: ts, js).
        basename: String,
        /// Project root the probe ran in.
        root: PathBuf,
    },

    /// Two route files normalized to the same route id.
    #[error("duplicate route id \"{id}\": {} and {}", .first.display(), .second.display())]
    DuplicateRouteId {
        /// The colliding id.
        id: String,
        /// File that claimed the id first.
        first: PathBuf,
        /// File that collided with it.
        second: PathBuf,
    },

    /// Mode string was not one of development/production/test.
    #[error("invalid server mode \"{0}\"")]
    InvalidMode(String),

    /// I/O failure while walking the source tree.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for configuration operations.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

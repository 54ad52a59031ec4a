//! CLI error type; every variant maps to exit code 1.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] tatami_config::ConfigError),

    #[error("build error: {0}")]
    Build(#[from] tatami_build::BuildError),

    #[error("build failed")]
    BuildFailed,

    #[error("server error: {0}")]
    Server(#[from] tatami_server::ServerError),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

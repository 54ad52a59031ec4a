//! Command line interface for the Tatami framework.

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;

pub use error::{CliError, Result};

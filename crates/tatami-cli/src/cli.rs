//! Command line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tatami_config::Mode;

#[derive(Debug, Parser)]
#[command(name = "tatami", version, about = "File-route SSR framework tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug-level logging.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the build pipeline once.
    Build(BuildArgs),
    /// Watch, rebuild, and serve with live reload.
    Dev(DevArgs),
    /// Serve a previously built project.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Project root directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Build mode.
    #[arg(long, default_value = "production")]
    pub mode: Mode,

    /// Emit source maps.
    #[arg(long)]
    pub sourcemap: bool,
}

#[derive(Debug, Args)]
pub struct DevArgs {
    /// Project root directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Port to bind the development server to.
    #[arg(long, short, default_value_t = 3000)]
    pub port: u16,

    /// Emit source maps.
    #[arg(long)]
    pub sourcemap: bool,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Project root directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Port to bind to.
    #[arg(long, short, default_value_t = 3000)]
    pub port: u16,

    /// Serve mode.
    #[arg(long, default_value = "production")]
    pub mode: Mode,
}

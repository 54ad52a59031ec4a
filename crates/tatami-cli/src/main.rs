//! Entry point for the `tatami` binary.

use clap::Parser;
use tatami_cli::{cli, commands, logger};
use tracing::error;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    logger::init_logger(args.verbose, args.quiet, args.no_color);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build::execute(build_args).await,
        cli::Command::Dev(dev_args) => commands::dev::execute(dev_args).await,
        cli::Command::Serve(serve_args) => commands::serve::execute(serve_args).await,
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }
}

//! `tatami build`: one full pipeline run.

use std::sync::Arc;

use tracing::info;

use tatami_build::{BuildOptions, PassthroughBundler};
use tatami_config::load_config;

use crate::cli::BuildArgs;
use crate::error::{CliError, Result};

pub async fn execute(args: BuildArgs) -> Result<()> {
    let config = load_config(&args.root, args.mode)?;
    info!(
        routes = config.routes.len(),
        mode = %args.mode,
        "building project"
    );

    let options = BuildOptions {
        mode: args.mode,
        sourcemap: args.sourcemap,
        ..BuildOptions::default()
    };
    let ok = tatami_build::build(
        Arc::new(PassthroughBundler::new()),
        &config,
        &options,
        &tatami_build::log_failure(),
    )
    .await;

    if ok {
        info!(
            server = %config.server_build_path.display(),
            client = %config.client_build_directory.display(),
            "build complete"
        );
        Ok(())
    } else {
        Err(CliError::BuildFailed)
    }
}

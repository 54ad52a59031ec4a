//! `tatami serve`: production server over a finished build.

use std::sync::Arc;

use tracing::info;

use tatami_server::{RequestHandler, ServerBuildCell, ServerBuildLoader};

use crate::cli::ServeArgs;
use crate::dev::{build_router, serve, AppState};
use crate::error::Result;

pub async fn execute(args: ServeArgs) -> Result<()> {
    let build = ServerBuildLoader::new(&args.root, args.mode).load()?;
    info!(
        routes = build.routes.len(),
        manifest = %build.assets.version,
        "serving project"
    );

    let assets_dir = build.config.client_build_directory.clone();
    let cell = Arc::new(ServerBuildCell::new(build));
    let handler = Arc::new(RequestHandler::new(cell, args.mode));

    let router = build_router(AppState {
        handler,
        broadcaster: None,
        assets_dir,
    });
    serve(router, args.port).await
}

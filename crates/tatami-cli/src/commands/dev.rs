//! `tatami dev`: watch, rebuild, and serve with live reload.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use tatami_build::watch::{watch, WatchCallbacks, WatchOptions};
use tatami_build::{BuildError, PassthroughBundler};
use tatami_config::{Mode, TatamiConfig};
use tatami_server::{RequestHandler, ServerBuildCell, ServerBuildLoader};

use crate::cli::DevArgs;
use crate::dev::{build_router, serve, AppState, ReloadBroadcaster, ReloadEvent};
use crate::error::Result;

pub async fn execute(args: DevArgs) -> Result<()> {
    let mode = Mode::Development;
    let broadcaster = Arc::new(ReloadBroadcaster::new());
    let loader = Arc::new(ServerBuildLoader::new(&args.root, mode));

    // The dispatcher needs a build before the first cycle completes; an
    // empty asset manifest at this point is fine.
    let initial = loader.load()?;
    let assets_dir = initial.config.client_build_directory.clone();
    let cell = Arc::new(ServerBuildCell::new(initial));

    let mut options = WatchOptions::new(&args.root);
    options.build.sourcemap = args.sourcemap;

    let swap = {
        let loader = Arc::clone(&loader);
        let cell = Arc::clone(&cell);
        let broadcaster = Arc::clone(&broadcaster);
        Arc::new(move |_config: &TatamiConfig| match loader.load() {
            Ok(build) => {
                let generation = cell.swap(build);
                debug!(generation, "server build swapped");
                broadcaster.notify(ReloadEvent::Reload);
            }
            Err(err) => error!(%err, "server build reload failed"),
        })
    };

    let on_failure = {
        let broadcaster = Arc::clone(&broadcaster);
        Arc::new(move |err: &BuildError| {
            error!(%err, "build failed");
            broadcaster.notify(ReloadEvent::Log {
                message: format!("build failed: {err}"),
            });
        })
    };

    let callbacks = WatchCallbacks {
        on_initial_build: Some(swap.clone()),
        on_rebuild_start: None,
        on_rebuild_finish: Some(swap),
        on_build_failure: Some(on_failure),
        on_file_created: Some(file_event("created", &broadcaster)),
        on_file_changed: Some(file_event("changed", &broadcaster)),
        on_file_deleted: Some(file_event("deleted", &broadcaster)),
    };

    let watcher = watch(Arc::new(PassthroughBundler::new()), options, callbacks).await?;
    info!(root = %args.root.display(), "watching for changes");

    let handler = Arc::new(RequestHandler::new(Arc::clone(&cell), mode));
    let router = build_router(AppState {
        handler,
        broadcaster: Some(broadcaster),
        assets_dir,
    });

    let result = serve(router, args.port).await;
    watcher.shutdown().await;
    result
}

fn file_event(
    verb: &'static str,
    broadcaster: &Arc<ReloadBroadcaster>,
) -> Arc<dyn Fn(&Path) + Send + Sync> {
    let broadcaster = Arc::clone(broadcaster);
    Arc::new(move |path: &Path| {
        let message = format!("{verb}: {}", path.display());
        info!("{message}");
        broadcaster.notify(ReloadEvent::Log { message });
    })
}

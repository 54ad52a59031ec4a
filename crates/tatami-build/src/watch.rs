//! Watch mode.
//!
//! A single control task owns all mutable state: the resolved configuration,
//! the live bundle handles, and two trailing-edge debouncers. Filesystem
//! events are bridged from notify's callback thread into a tokio channel and
//! classified against the current configuration; restart-class changes tear
//! the cycle down and rebuild from a fresh config, incremental-class changes
//! reuse the live rebuild handles.
//!
//! No error escapes a cycle. Failures report through the callbacks and the
//! previous good artifact keeps serving.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tatami_config::{load_config, Mode, TatamiConfig, TemplateMap};

use crate::bundler::{BundleHandle, Bundler};
use crate::debounce::Debouncer;
use crate::error::{BuildError, Result};
use crate::manifest::ManifestCell;
use crate::pipeline::{write_server_build_result, BuildOptions, BundlePipeline, FailureHandler};

/// Quiet period before a restart-class cycle runs.
pub const RESTART_DEBOUNCE: Duration = Duration::from_millis(500);

/// Quiet period before an incremental-class cycle runs.
pub const INCREMENTAL_DEBOUNCE: Duration = Duration::from_millis(100);

/// One filesystem change as seen by the reconciler.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Changed,
    Deleted,
}

/// How a change affects the running build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    /// Entry, route, or template change: tear down and rebuild from a fresh
    /// configuration.
    Restart,
    /// Ordinary source change: rebuild through the live handles.
    Incremental,
}

/// Classify a path against the current configuration.
pub fn classify(config: &TatamiConfig, path: &Path) -> ChangeClass {
    if config.is_entry_point(path)
        || config.is_route_file(path)
        || TemplateMap::is_template_file(path)
    {
        ChangeClass::Restart
    } else {
        ChangeClass::Incremental
    }
}

type EventCallback = Arc<dyn Fn(&Path) + Send + Sync>;
type BuildCallback = Arc<dyn Fn(&TatamiConfig) + Send + Sync>;

/// Hooks into the watch lifecycle. All optional.
#[derive(Clone, Default)]
pub struct WatchCallbacks {
    pub on_initial_build: Option<BuildCallback>,
    pub on_rebuild_start: Option<BuildCallback>,
    /// Invoked only after a cycle that fully succeeded.
    pub on_rebuild_finish: Option<BuildCallback>,
    pub on_build_failure: Option<Arc<dyn Fn(&BuildError) + Send + Sync>>,
    pub on_file_created: Option<EventCallback>,
    pub on_file_changed: Option<EventCallback>,
    pub on_file_deleted: Option<EventCallback>,
}

impl WatchCallbacks {
    fn failure_handler(&self) -> FailureHandler {
        match &self.on_build_failure {
            Some(callback) => {
                let callback = Arc::clone(callback);
                Arc::new(move |err| callback(err))
            }
            None => crate::pipeline::log_failure(),
        }
    }

    fn file_event(&self, event: &WatchEvent) {
        let callback = match event.kind {
            WatchEventKind::Created => &self.on_file_created,
            WatchEventKind::Changed => &self.on_file_changed,
            WatchEventKind::Deleted => &self.on_file_deleted,
        };
        if let Some(callback) = callback {
            callback(&event.path);
        }
    }
}

/// Options for one watch session.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub root: PathBuf,
    pub mode: Mode,
    pub build: BuildOptions,
    pub restart_window: Duration,
    pub incremental_window: Duration,
}

impl WatchOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: Mode::Development,
            build: BuildOptions {
                mode: Mode::Development,
                incremental: true,
                ..BuildOptions::default()
            },
            restart_window: RESTART_DEBOUNCE,
            incremental_window: INCREMENTAL_DEBOUNCE,
        }
    }
}

/// Handle to a running watch session.
pub struct Watcher {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    cell: ManifestCell,
}

impl Watcher {
    /// The manifest cell shared with the build cycles, for consumers that
    /// want to await the current manifest.
    pub fn manifest_cell(&self) -> ManifestCell {
        self.cell.clone()
    }

    /// Stop watching and wait for the control task to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

/// Start watch mode: run an initial build, then reconcile filesystem changes
/// into build cycles until shutdown.
pub async fn watch(
    bundler: Arc<dyn Bundler>,
    options: WatchOptions,
    callbacks: WatchCallbacks,
) -> Result<Watcher> {
    let config = load_config(&options.root, options.mode)?;
    let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(256);

    let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        let kind = match event.kind {
            notify::EventKind::Create(_) => WatchEventKind::Created,
            notify::EventKind::Modify(_) => WatchEventKind::Changed,
            notify::EventKind::Remove(_) => WatchEventKind::Deleted,
            _ => return,
        };
        for path in event.paths {
            let _ = event_tx.blocking_send(WatchEvent {
                kind,
                path: path.clone(),
            });
        }
    })?;

    fs_watcher.watch(&config.source_directory, RecursiveMode::Recursive)?;
    for dir in &config.custom_watch_directories {
        if dir.exists() {
            fs_watcher.watch(dir, RecursiveMode::Recursive)?;
        }
    }
    for entry in [&config.entry_client_file, &config.entry_server_file] {
        if !entry.starts_with(&config.source_directory) && entry.exists() {
            fs_watcher.watch(entry, RecursiveMode::NonRecursive)?;
        }
    }

    let cell = ManifestCell::new();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let mut reconciler = Reconciler {
        pipeline: BundlePipeline::new(bundler),
        config,
        options,
        callbacks,
        cell: cell.clone(),
        client: None,
        server: None,
    };

    let task = tokio::spawn(async move {
        // Keeps the notify watcher alive for the lifetime of the loop.
        let _fs_watcher = fs_watcher;
        reconciler.run(event_rx, shutdown_rx).await;
    });

    Ok(Watcher {
        shutdown: shutdown_tx,
        task,
        cell,
    })
}

struct Reconciler {
    pipeline: BundlePipeline,
    config: TatamiConfig,
    options: WatchOptions,
    callbacks: WatchCallbacks,
    cell: ManifestCell,
    client: Option<BundleHandle>,
    server: Option<BundleHandle>,
}

impl Reconciler {
    async fn run(
        &mut self,
        mut events: mpsc::Receiver<WatchEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let on_failure = self.callbacks.failure_handler();

        if self.build(&on_failure).await {
            if let Some(callback) = &self.callbacks.on_initial_build {
                callback(&self.config);
            }
        }

        let mut restart = Debouncer::new(self.options.restart_window);
        let mut incremental = Debouncer::new(self.options.incremental_window);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.absorb_event(event, &mut restart, &mut incremental, &on_failure)
                        .await;
                }
                _ = restart.fired() => {
                    incremental.cancel();
                    self.restart_cycle(&on_failure).await;
                }
                _ = incremental.fired() => {
                    self.incremental_cycle(&on_failure).await;
                }
            }
        }

        self.dispose_handles();
        debug!("watch loop stopped");
    }

    /// Classify one event and arm the matching debouncer.
    async fn absorb_event(
        &mut self,
        event: WatchEvent,
        restart: &mut Debouncer,
        incremental: &mut Debouncer,
        on_failure: &FailureHandler,
    ) {
        if self.config.is_build_output(&event.path) || is_noise(&event.path) {
            return;
        }

        // A created file may introduce a route or entry the current config
        // has never seen; classification must look at a fresh config.
        if event.kind == WatchEventKind::Created {
            match load_config(&self.options.root, self.options.mode) {
                Ok(config) => self.config = config,
                Err(err) => {
                    on_failure(&err.into());
                    return;
                }
            }
        }

        self.callbacks.file_event(&event);

        match classify(&self.config, &event.path) {
            ChangeClass::Restart => {
                debug!(path = %event.path.display(), "restart-class change");
                incremental.cancel();
                restart.poke();
            }
            ChangeClass::Incremental => {
                // A pending restart supersedes incremental work.
                if restart.is_armed() {
                    restart.poke();
                } else {
                    debug!(path = %event.path.display(), "incremental-class change");
                    incremental.poke();
                }
            }
        }
    }

    /// Tear down and rebuild from a freshly resolved configuration.
    async fn restart_cycle(&mut self, on_failure: &FailureHandler) {
        info!("restarting build");
        if let Some(callback) = &self.callbacks.on_rebuild_start {
            callback(&self.config);
        }
        self.dispose_handles();

        match load_config(&self.options.root, self.options.mode) {
            Ok(config) => self.config = config,
            Err(err) => {
                on_failure(&err.into());
                return;
            }
        }

        if self.build(on_failure).await {
            if let Some(callback) = &self.callbacks.on_rebuild_finish {
                callback(&self.config);
            }
        }
    }

    /// Rebuild through the live handles, or fall back to a restart when the
    /// bundler gave us none.
    async fn incremental_cycle(&mut self, on_failure: &FailureHandler) {
        let rebuildable = self
            .client
            .as_ref()
            .is_some_and(BundleHandle::supports_rebuild)
            && self
                .server
                .as_ref()
                .is_some_and(BundleHandle::supports_rebuild);
        if !rebuildable {
            warn!("no incremental handles, falling back to restart");
            self.restart_cycle(on_failure).await;
            return;
        }

        info!("incremental rebuild");
        if let Some(callback) = &self.callbacks.on_rebuild_start {
            callback(&self.config);
        }

        match self.rebuild().await {
            Ok(()) => {
                if let Some(callback) = &self.callbacks.on_rebuild_finish {
                    callback(&self.config);
                }
            }
            Err(err) => {
                on_failure(&err);
                self.dispose_handles();
            }
        }
    }

    async fn rebuild(&mut self) -> Result<()> {
        let publisher = self.cell.begin_cycle();

        let client = self.client.as_mut().and_then(|h| h.rebuild.as_mut());
        let Some(client) = client else {
            publisher.fail();
            return Err(BuildError::Bundler("client handle lost".into()));
        };
        let client_output = match client.rebuild().await {
            Ok(output) => output,
            Err(err) => {
                publisher.fail();
                return Err(err);
            }
        };
        let manifest =
            crate::manifest::generate_assets_manifest(&self.config, &client_output.metafile)
                .await;
        match manifest {
            Ok(manifest) => publisher.publish(manifest),
            Err(err) => {
                publisher.fail();
                return Err(err);
            }
        }
        if let Some(handle) = self.client.as_mut() {
            handle.metafile = client_output.metafile;
        }

        let server = self.server.as_mut().and_then(|h| h.rebuild.as_mut());
        let Some(server) = server else {
            return Err(BuildError::Bundler("server handle lost".into()));
        };
        let server_output = server.rebuild().await?;
        write_server_build_result(&self.config, &server_output.output_files).await?;
        if let Some(handle) = self.server.as_mut() {
            handle.metafile = server_output.metafile;
        }

        Ok(())
    }

    async fn build(&mut self, on_failure: &FailureHandler) -> bool {
        let (client, server) = self
            .pipeline
            .build_everything(&self.config, &self.options.build, &self.cell, on_failure)
            .await;
        let ok = client.is_some() && server.is_some();
        self.client = client;
        self.server = server;
        ok
    }

    fn dispose_handles(&mut self) {
        if let Some(mut handle) = self.client.take() {
            handle.dispose();
        }
        if let Some(mut handle) = self.server.take() {
            handle.dispose();
        }
    }
}

/// Editor droppings and dependency trees never trigger cycles.
fn is_noise(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name == "node_modules" || (name.starts_with('.') && name.len() > 1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::bundler::{BundleJob, BundleOutput};
    use crate::passthrough::PassthroughBundler;

    fn scaffold() -> (TempDir, TatamiConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/routes")).unwrap();
        fs::create_dir_all(dir.path().join("src/layouts")).unwrap();
        fs::write(dir.path().join("src/entry-client.ts"), "export {};\n").unwrap();
        fs::write(dir.path().join("src/entry-server.ts"), "export {};\n").unwrap();
        fs::write(dir.path().join("src/routes/index.ts"), "export const get = 1;\n").unwrap();
        let config = load_config(dir.path(), Mode::Test).unwrap();
        (dir, config)
    }

    #[test]
    fn test_entry_route_and_template_changes_are_restart_class() {
        let (_dir, config) = scaffold();

        assert_eq!(classify(&config, &config.entry_client_file), ChangeClass::Restart);
        assert_eq!(classify(&config, &config.entry_server_file), ChangeClass::Restart);
        assert_eq!(
            classify(&config, &config.routes_directory.join("about.ts")),
            ChangeClass::Restart
        );
        assert_eq!(
            classify(&config, &config.layouts_directory.join("default.html")),
            ChangeClass::Restart
        );
        assert_eq!(
            classify(&config, &config.source_directory.join("content/post.md")),
            ChangeClass::Restart
        );
    }

    #[test]
    fn test_ordinary_source_changes_are_incremental_class() {
        let (_dir, config) = scaffold();

        assert_eq!(
            classify(&config, &config.source_directory.join("lib/util.ts")),
            ChangeClass::Incremental
        );
        assert_eq!(
            classify(&config, &config.source_directory.join("components/button.ts")),
            ChangeClass::Incremental
        );
    }

    struct CountingBundler {
        inner: PassthroughBundler,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Bundler for CountingBundler {
        async fn bundle(&self, job: BundleJob) -> crate::error::Result<BundleOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.bundle(job).await
        }
    }

    async fn wait_until(predicate: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !predicate() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_class_events_within_window_yield_one_cycle() {
        let (dir, config) = scaffold();
        let changed = config.source_directory.join("lib/util.ts");

        let calls = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));

        let mut options = WatchOptions::new(dir.path());
        options.mode = Mode::Test;
        options.build.mode = Mode::Test;
        // Without rebuild handles every incremental firing falls back to a
        // full cycle, which the counting bundler sees as three jobs.
        options.build.incremental = false;
        options.restart_window = Duration::from_millis(150);
        options.incremental_window = Duration::from_millis(150);

        let callbacks = WatchCallbacks {
            on_rebuild_finish: Some({
                let finishes = Arc::clone(&finishes);
                Arc::new(move |_config: &TatamiConfig| {
                    finishes.fetch_add(1, Ordering::SeqCst);
                })
            }),
            ..WatchCallbacks::default()
        };

        let (event_tx, event_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let mut reconciler = Reconciler {
            pipeline: BundlePipeline::new(Arc::new(CountingBundler {
                inner: PassthroughBundler::new(),
                calls: Arc::clone(&calls),
            })),
            config,
            options,
            callbacks,
            cell: ManifestCell::new(),
            client: None,
            server: None,
        };
        let task = tokio::spawn(async move { reconciler.run(event_rx, shutdown_rx).await });

        wait_until(|| calls.load(Ordering::SeqCst) >= 3).await;
        let after_initial = calls.load(Ordering::SeqCst);
        assert_eq!(after_initial, 3);

        for _ in 0..5 {
            event_tx
                .send(WatchEvent {
                    kind: WatchEventKind::Changed,
                    path: changed.clone(),
                })
                .await
                .unwrap();
        }

        wait_until(|| finishes.load(Ordering::SeqCst) >= 1).await;
        // A further quiet period must not surface a second cycle.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_initial + 3);
        assert_eq!(finishes.load(Ordering::SeqCst), 1);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_noise_paths_are_skipped() {
        assert!(is_noise(Path::new("/p/node_modules/left-pad/index.js")));
        assert!(is_noise(Path::new("/p/src/.swp")));
        assert!(is_noise(Path::new("/p/.git/HEAD")));
        assert!(!is_noise(Path::new("/p/src/lib/util.ts")));
    }
}

//! Build orchestration for the Tatami framework.
//!
//! Three interdependent compilation units are coordinated here: the browser
//! bundle, the per-route module bundle, and the server bundle, plus the
//! versioned asset manifest the server bundle embeds. The cross-artifact
//! dependency (the server bundle needs a manifest URL that only exists once
//! the client bundle finishes) flows through the shared [`ManifestCell`].
//!
//! The actual bundling is behind the [`Bundler`] trait; this crate defines
//! orchestration, not a module bundler. [`PassthroughBundler`] is a minimal
//! conforming implementation used by the CLI and the test suite.
//!
//! In watch mode the [`watch`] reconciler classifies filesystem events,
//! debounces them, and decides between a full restart (dispose handles,
//! reload config, rebuild everything) and an incremental rebuild that reuses
//! live bundle handles.

pub mod bundler;
pub mod debounce;
pub mod error;
pub mod manifest;
pub mod passthrough;
pub mod pipeline;
pub mod virtual_modules;
pub mod watch;

pub use bundler::{
    BuildMetafile, BundleHandle, BundleJob, BundleOutput, Bundler, EntryPoints, ImportKind,
    Loader, MetaImport, MetaOutput, OutputFile, Platform, RebuildHandle, SourceFile,
    SourceProvider,
};
pub use debounce::Debouncer;
pub use error::{BuildError, Result};
pub use manifest::{AssetManifest, ManifestCell, ManifestEntry, ManifestPublisher, MANIFEST_GLOBAL};
pub use passthrough::PassthroughBundler;
pub use pipeline::{build, log_failure, BuildOptions, BundlePipeline, FailureHandler};
pub use virtual_modules::{
    AssetsManifestModuleProvider, RouteModulesProvider, ServerBuildModuleProvider,
    ASSETS_MANIFEST_SPECIFIER, SERVER_BUILD_SPECIFIER,
};
pub use watch::{watch, ChangeClass, WatchCallbacks, WatchEvent, WatchEventKind, WatchOptions, Watcher};

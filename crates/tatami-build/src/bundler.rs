//! The bundler seam.
//!
//! Tatami does not define a module bundler; it orchestrates one. A
//! conforming bundler implements [`Bundler`], resolves the reserved virtual
//! specifiers through the supplied [`SourceProvider`]s, reports its outputs
//! through a [`BuildMetafile`], and may expose an incremental
//! [`RebuildHandle`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Target platform of a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Browser,
    Server,
}

/// Source language of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Js,
    Ts,
    Json,
    Text,
}

/// In-memory build input produced by a [`SourceProvider`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub contents: String,
    pub loader: Loader,
}

/// Synthesizes build inputs that are not backed by files on disk.
///
/// This is the seam that replaces bundler-plugin resolve/load hooks: the
/// orchestration stays independent of any particular bundler's plugin API.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Whether this provider owns the given specifier.
    fn resolve(&self, specifier: &str) -> bool;

    /// Produce the module contents for an owned specifier.
    async fn load(&self, specifier: &str) -> Result<SourceFile>;
}

/// Entry points of one compilation unit.
#[derive(Debug, Clone)]
pub enum EntryPoints {
    /// Named entries: logical name to source file.
    Named(Vec<(String, PathBuf)>),
    /// A synthesized root module (the server build's aggregate entry).
    Virtual {
        contents: String,
        resolve_dir: PathBuf,
    },
}

/// One compilation request handed to the bundler.
#[derive(Clone)]
pub struct BundleJob {
    pub platform: Platform,
    pub entry_points: EntryPoints,
    /// Output directory for multi-output builds.
    pub outdir: Option<PathBuf>,
    /// Single output file for the server build.
    pub outfile: Option<PathBuf>,
    /// When false the bundler returns output files instead of writing them.
    pub write: bool,
    pub splitting: bool,
    pub sourcemap: bool,
    pub minify: bool,
    /// Request an incremental rebuild handle.
    pub incremental: bool,
    /// Runtime target token for server-platform units, e.g. `node18`.
    pub target: Option<String>,
    /// Output naming pattern, e.g. `[dir]/[name]-[hash]`.
    pub entry_names: Option<String>,
    /// Public URL prefix baked into emitted code.
    pub public_path: Option<String>,
    /// Providers consulted before the filesystem.
    pub providers: Vec<Arc<dyn SourceProvider>>,
}

impl BundleJob {
    pub fn new(platform: Platform, entry_points: EntryPoints) -> Self {
        Self {
            platform,
            entry_points,
            outdir: None,
            outfile: None,
            write: true,
            splitting: false,
            sourcemap: false,
            minify: false,
            incremental: false,
            target: None,
            entry_names: None,
            public_path: None,
            providers: Vec::new(),
        }
    }
}

impl fmt::Debug for BundleJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleJob")
            .field("platform", &self.platform)
            .field("entry_points", &self.entry_points)
            .field("outdir", &self.outdir)
            .field("outfile", &self.outfile)
            .field("write", &self.write)
            .field("incremental", &self.incremental)
            .field("target", &self.target)
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Why an output imports another output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Static `import` statement; included in the asset manifest.
    ImportStatement,
    /// Dynamic `import()`; excluded from the manifest.
    DynamicImport,
}

/// One import edge in the output graph.
#[derive(Debug, Clone)]
pub struct MetaImport {
    /// Output-relative path of the imported file.
    pub path: String,
    pub kind: ImportKind,
}

/// Metadata for one emitted output file.
#[derive(Debug, Clone, Default)]
pub struct MetaOutput {
    /// Source entry file this output was compiled from, if it is an entry.
    pub entry_point: Option<PathBuf>,
    pub imports: Vec<MetaImport>,
}

/// Build metadata across all outputs, keyed by output path.
///
/// A `BTreeMap` keeps iteration deterministic; manifest generation depends
/// on that.
#[derive(Debug, Clone, Default)]
pub struct BuildMetafile {
    pub outputs: BTreeMap<String, MetaOutput>,
}

/// One emitted file when the bundler is asked not to write.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Incremental rebuild capability of a live bundle.
#[async_trait]
pub trait RebuildHandle: Send {
    /// Re-run the compilation reusing internal caches.
    async fn rebuild(&mut self) -> Result<BundleOutput>;

    /// Release incremental-compile resources. Idempotent.
    fn dispose(&mut self);
}

/// Result of one compilation.
pub struct BundleOutput {
    pub metafile: BuildMetafile,
    /// Present when the job requested `write = false`.
    pub output_files: Vec<OutputFile>,
    /// Present when the job requested `incremental = true`.
    pub rebuild: Option<Box<dyn RebuildHandle>>,
}

impl fmt::Debug for BundleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleOutput")
            .field("outputs", &self.metafile.outputs.len())
            .field("output_files", &self.output_files.len())
            .field("incremental", &self.rebuild.is_some())
            .finish()
    }
}

/// A live build artifact owned by the watcher.
///
/// Holds the latest metafile plus the rebuild capability, if any. Disposed
/// on restart-class changes.
pub struct BundleHandle {
    pub metafile: BuildMetafile,
    pub rebuild: Option<Box<dyn RebuildHandle>>,
}

impl BundleHandle {
    pub fn from_output(output: BundleOutput) -> Self {
        Self {
            metafile: output.metafile,
            rebuild: output.rebuild,
        }
    }

    /// Whether this handle supports incremental rebuilds.
    pub fn supports_rebuild(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Release incremental resources.
    pub fn dispose(&mut self) {
        if let Some(rebuild) = self.rebuild.as_mut() {
            rebuild.dispose();
        }
        self.rebuild = None;
    }
}

impl fmt::Debug for BundleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleHandle")
            .field("outputs", &self.metafile.outputs.len())
            .field("incremental", &self.rebuild.is_some())
            .finish()
    }
}

/// A pluggable module bundler.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, job: BundleJob) -> Result<BundleOutput>;
}

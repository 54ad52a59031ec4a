//! Asset manifest generation and the shared manifest cell.
//!
//! The manifest maps each logical client entry to its compiled URL and the
//! URLs of its statically-imported siblings. Its `version` is a content hash
//! of the serialized entries map, so identical inputs always produce the
//! same version and any entry change produces a new one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::debug;

use tatami_config::TatamiConfig;

use crate::bundler::{BuildMetafile, ImportKind};
use crate::error::Result;

/// Global the manifest loader artifact assigns in the browser.
pub const MANIFEST_GLOBAL: &str = "window.__TATAMI_ASSETS_MANIFEST";

/// Compiled module URL plus its static import graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub module: String,
    pub imports: Vec<String>,
}

/// Versioned mapping from logical client entry name to compiled assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub version: String,
    pub entries: BTreeMap<String, ManifestEntry>,
    /// Public URL of the loader artifact, set once it has been written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Hash the serialized entries map into a version string.
pub fn manifest_version(entries: &BTreeMap<String, ManifestEntry>) -> Result<String> {
    let serialized = serde_json::to_string(entries)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Build an [`AssetManifest`] from the client bundle's metafile.
///
/// For each configured logical entry, the output whose `entry_point` matches
/// the entry file contributes its URL and the URLs of its static imports;
/// dynamic imports are excluded. Pure: no filesystem access.
pub fn create_assets_manifest(
    config: &TatamiConfig,
    metafile: &BuildMetafile,
) -> Result<AssetManifest> {
    let resolve_url = |output: &str| -> String {
        let relative = Path::new(output)
            .strip_prefix(&config.client_build_directory)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from(output));
        create_url(&config.client_public_path, &relative)
    };

    let mut entries: BTreeMap<String, ManifestEntry> = BTreeMap::new();
    for (output_path, output) in &metafile.outputs {
        let Some(entry_point) = &output.entry_point else {
            continue;
        };
        for (name, entry_file) in &config.client_entries {
            if entry_point != entry_file {
                continue;
            }
            let imports = output
                .imports
                .iter()
                .filter(|import| import.kind == ImportKind::ImportStatement)
                .map(|import| resolve_url(&import.path))
                .collect();
            entries.insert(
                name.clone(),
                ManifestEntry {
                    module: resolve_url(output_path),
                    imports,
                },
            );
        }
    }

    if entries.len() < config.client_entries.len() {
        for name in config.client_entries.keys() {
            if !entries.contains_key(name) {
                debug!(entry = %name, "client entry produced no compiled output");
            }
        }
    }

    let version = manifest_version(&entries)?;
    Ok(AssetManifest {
        version,
        entries,
        url: None,
    })
}

/// Build the manifest and persist its loader artifact.
///
/// The loader filename embeds the (uppercased) version so a stale manifest
/// is distinguishable by URL alone; its contents expose the manifest as a
/// browser global.
pub async fn generate_assets_manifest(
    config: &TatamiConfig,
    metafile: &BuildMetafile,
) -> Result<AssetManifest> {
    let mut manifest = create_assets_manifest(config, metafile)?;
    let filename = format!("manifest-{}", manifest.version.to_uppercase());
    manifest.url = Some(format!("{}{}", config.client_public_path, filename));

    let contents = format!("{}={}", MANIFEST_GLOBAL, serde_json::to_string(&manifest)?);
    write_file_safe(&config.client_build_directory.join(&filename), &contents).await?;
    remove_superseded_artifacts(&config.client_build_directory, &filename).await;

    debug!(version = %manifest.version, "assets manifest generated");
    Ok(manifest)
}

/// Delete loader artifacts from previous cycles.
///
/// Only the current cycle's artifact may remain on disk; the server build
/// loader reads the manifest back by filename prefix and must never find a
/// superseded version next to the live one.
async fn remove_superseded_artifacts(dir: &Path, keep: &str) {
    let Ok(mut listing) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = listing.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with("manifest-") && name != keep {
            if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                debug!(artifact = %name, %err, "stale manifest artifact not removed");
            }
        }
    }
}

/// Join a public path and a slash-normalized relative file path.
pub fn create_url(public_path: &str, file: &Path) -> String {
    let slashed = file
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{public_path}{slashed}")
}

/// Write a file, creating parent directories as needed.
pub async fn write_file_safe(file: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(file, contents).await?;
    Ok(())
}

/// State of the current cycle's manifest computation.
#[derive(Debug, Clone)]
enum ManifestState {
    /// No cycle has produced a manifest yet.
    Unavailable,
    /// The current cycle's computation is still in flight.
    Pending,
    Ready(AssetManifest),
}

/// Shared cell holding the in-flight or latest manifest computation.
///
/// The client build publishes into it; the server bundle's virtual manifest
/// module awaits it. `begin_cycle` overwrites the cell before a new cycle's
/// builds start, so a consumer never observes a stale manifest from a prior
/// cycle.
#[derive(Clone)]
pub struct ManifestCell {
    receiver: Arc<Mutex<watch::Receiver<ManifestState>>>,
}

impl Default for ManifestCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestCell {
    pub fn new() -> Self {
        let (_tx, rx) = watch::channel(ManifestState::Unavailable);
        Self {
            receiver: Arc::new(Mutex::new(rx)),
        }
    }

    /// Install a fresh pending computation for a new cycle and return its
    /// publisher. Must be called before the cycle's builds start.
    pub fn begin_cycle(&self) -> ManifestPublisher {
        let (tx, rx) = watch::channel(ManifestState::Pending);
        *self.receiver.lock() = rx;
        ManifestPublisher { sender: tx, done: false }
    }

    /// Await the current cycle's manifest.
    ///
    /// Resolves to `None` when no manifest is available (before the first
    /// cycle, or after a failed one).
    pub async fn resolve(&self) -> Option<AssetManifest> {
        let mut rx = self.receiver.lock().clone();
        let state = rx
            .wait_for(|state| !matches!(state, ManifestState::Pending))
            .await;
        match state {
            Ok(state) => match &*state {
                ManifestState::Ready(manifest) => Some(manifest.clone()),
                _ => None,
            },
            // Publisher dropped without publishing.
            Err(_) => None,
        }
    }
}

/// Producer half of one cycle's manifest computation.
pub struct ManifestPublisher {
    sender: watch::Sender<ManifestState>,
    done: bool,
}

impl ManifestPublisher {
    pub fn publish(mut self, manifest: AssetManifest) {
        self.sender.send_replace(ManifestState::Ready(manifest));
        self.done = true;
    }

    pub fn fail(mut self) {
        self.sender.send_replace(ManifestState::Unavailable);
        self.done = true;
    }
}

impl Drop for ManifestPublisher {
    fn drop(&mut self) {
        // A dropped publisher must not leave consumers waiting forever.
        if !self.done {
            self.sender.send_replace(ManifestState::Unavailable);
        }
    }
}

//! Server build assembly.
//!
//! Pulls together everything a [`ServerBuild`] needs: the resolved
//! configuration, the latest asset manifest read back from its on-disk
//! loader artifact, the template sources, theme data, and the registered
//! route handlers. Used at startup and after each successful rebuild.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use tatami_build::{AssetManifest, MANIFEST_GLOBAL};
use tatami_config::{load_config, Mode, TatamiConfig, Theme};

use crate::build::{DefaultServerEntry, RouteBuild, RouteManifest, ServerBuild, ServerEntry};
use crate::error::Result;
use crate::module::{DefaultRouteModule, RouteModule};
use crate::templates::TemplateContext;

/// Route handlers by route id. Routes without an entry degrade to
/// [`DefaultRouteModule`].
#[derive(Default)]
pub struct HandlerRegistry {
    modules: HashMap<String, Arc<dyn RouteModule>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route_id: impl Into<String>, module: Arc<dyn RouteModule>) {
        self.modules.insert(route_id.into(), module);
    }

    pub fn get(&self, route_id: &str) -> Option<Arc<dyn RouteModule>> {
        self.modules.get(route_id).cloned()
    }
}

pub struct ServerBuildLoader {
    root: std::path::PathBuf,
    mode: Mode,
    registry: HandlerRegistry,
    entry: Arc<dyn ServerEntry>,
}

impl ServerBuildLoader {
    pub fn new(root: impl Into<std::path::PathBuf>, mode: Mode) -> Self {
        Self {
            root: root.into(),
            mode,
            registry: HandlerRegistry::new(),
            entry: Arc::new(DefaultServerEntry),
        }
    }

    pub fn with_entry(mut self, entry: Arc<dyn ServerEntry>) -> Self {
        self.entry = entry;
        self
    }

    pub fn register(&mut self, route_id: impl Into<String>, module: Arc<dyn RouteModule>) {
        self.registry.register(route_id, module);
    }

    /// Assemble a fresh [`ServerBuild`] from disk.
    pub fn load(&self) -> Result<ServerBuild> {
        let config = load_config(&self.root, self.mode)?;
        let assets = read_manifest_artifact(&config);
        let templates = TemplateContext::from_sources(template_sources(&config));
        let theme = Theme::load(&config.theme_directory);

        let mut routes = RouteManifest::new();
        for route in config.routes.iter() {
            let module = self
                .registry
                .get(&route.id)
                .unwrap_or_else(|| Arc::new(DefaultRouteModule::new(&route.id)));
            routes.insert(
                route.id.clone(),
                RouteBuild {
                    id: route.id.clone(),
                    path: route.path.clone(),
                    module,
                },
            );
        }

        debug!(
            routes = routes.len(),
            manifest = %assets.version,
            "server build assembled"
        );

        Ok(ServerBuild {
            entry: Arc::clone(&self.entry),
            routes,
            assets,
            templates,
            theme,
            config,
        })
    }
}

/// Read template sources from disk under their rendering prefixes. Sections
/// are additionally aliased under `routes/` so route handlers can render
/// them as page content.
fn template_sources(config: &TatamiConfig) -> IndexMap<String, String> {
    let mut sources = IndexMap::new();
    let mut add = |prefix: &str, name: &str, file: &Path| match std::fs::read_to_string(file) {
        Ok(contents) => {
            sources.insert(format!("{prefix}/{name}"), contents);
        }
        Err(err) => warn!(file = %file.display(), %err, "template source unreadable"),
    };

    for (name, file) in &config.templates.layouts {
        add("layouts", name, file);
    }
    for (name, file) in &config.templates.partials {
        add("partials", name, file);
    }
    for (name, file) in &config.templates.sections {
        add("sections", name, file);
        add("routes", name, file);
    }
    sources
}

/// Read the manifest loader artifact back into an [`AssetManifest`].
///
/// The generator deletes superseded artifacts, but a crashed cycle can still
/// leave more than one on disk; the most recently written artifact wins, not
/// the highest-sorting version hash. Absence (or an unparseable artifact)
/// degrades to an empty manifest; the server can run before the first client
/// build completes.
fn read_manifest_artifact(config: &TatamiConfig) -> AssetManifest {
    let prefix = format!("{MANIFEST_GLOBAL}=");
    let Ok(listing) = std::fs::read_dir(&config.client_build_directory) else {
        return AssetManifest::default();
    };
    let mut candidates: Vec<(std::time::SystemTime, std::path::PathBuf)> = listing
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("manifest-"))
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();
    // Newest first; filename breaks ties so the order is total.
    candidates.sort_by(|a, b| b.cmp(a));

    for (_, path) in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        let Some(json) = contents.strip_prefix(&prefix) else {
            continue;
        };
        match serde_json::from_str::<AssetManifest>(json) {
            Ok(manifest) => return manifest,
            Err(err) => warn!(file = %path.display(), %err, "manifest artifact unparseable"),
        }
    }
    AssetManifest::default()
}

//! Resolved project configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::markdown::{load_markdown_contents, MarkdownConfig};
use crate::mode::Mode;
use crate::routes::{RouteTable, RouteTableBuilder};
use crate::settings::AppSettings;
use crate::templates::TemplateMap;

/// Relative spellings kept alongside the absolute paths.
///
/// The watcher classifies filesystem events against these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativePaths {
    pub routes: String,
    pub layouts: String,
    pub sections: String,
    pub partials: String,
    pub entry_client: String,
    pub entry_server: String,
}

/// Fully resolved configuration for one build cycle.
///
/// Produced at startup and re-produced by the watcher on restart-class
/// changes; consumers treat it as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TatamiConfig {
    pub root_directory: PathBuf,
    pub source_directory: PathBuf,
    pub routes_directory: PathBuf,
    pub layouts_directory: PathBuf,
    pub sections_directory: PathBuf,
    pub partials_directory: PathBuf,
    pub theme_directory: PathBuf,

    pub server_build_directory: PathBuf,
    /// Final server bundle path (`<server_build_directory>/index.js`).
    pub server_build_path: PathBuf,

    pub client_build_directory: PathBuf,
    /// Public URL prefix client assets are served under.
    pub client_public_path: String,

    pub entry_client_file: PathBuf,
    pub entry_server_file: PathBuf,
    /// Logical client entry name to source file.
    pub client_entries: BTreeMap<String, PathBuf>,

    pub routes: RouteTable,
    pub templates: TemplateMap,
    /// Opt-in front-matter markdown content map.
    pub markdown: MarkdownConfig,

    pub relative: RelativePaths,
    pub custom_watch_directories: Vec<PathBuf>,

    pub mode: Mode,
}

/// Resolve the configuration for a project root.
///
/// Loads `tatami.toml`, applies directory defaults, probes the entry files,
/// and builds the route table and template map. Any failure here is fatal to
/// startup; the watcher also calls this on restart cycles and treats a
/// failure as an aborted cycle.
pub fn load_config(root: &Path, mode: Mode) -> Result<TatamiConfig> {
    let root_directory = absolutize(root);
    let settings = AppSettings::load(&root_directory)?;

    let source_directory =
        root_directory.join(settings.source_directory.as_deref().unwrap_or("src"));

    let relative = RelativePaths {
        routes: settings.routes_directory.clone().unwrap_or_else(|| "routes".into()),
        layouts: settings.layouts_directory.clone().unwrap_or_else(|| "layouts".into()),
        sections: settings.sections_directory.clone().unwrap_or_else(|| "sections".into()),
        partials: settings.partials_directory.clone().unwrap_or_else(|| "partials".into()),
        entry_client: settings
            .entry_client_file
            .clone()
            .unwrap_or_else(|| "src/entry-client".into()),
        entry_server: settings
            .entry_server_file
            .clone()
            .unwrap_or_else(|| "src/entry-server".into()),
    };

    let routes_directory = source_directory.join(&relative.routes);
    let layouts_directory = source_directory.join(&relative.layouts);
    let sections_directory = source_directory.join(&relative.sections);
    let partials_directory = source_directory.join(&relative.partials);
    let theme_directory =
        source_directory.join(settings.theme_directory.as_deref().unwrap_or("theme"));

    let server_build_directory = root_directory.join(
        settings
            .server_build_directory
            .as_deref()
            .unwrap_or(".tatami/server"),
    );
    let server_build_path = server_build_directory.join("index.js");

    let client_build_directory = root_directory.join(
        settings
            .client_build_directory
            .as_deref()
            .unwrap_or(".tatami/browser"),
    );
    let client_public_path = "/assets/".to_string();

    let entry_client_file = find_entry_file(&root_directory, &relative.entry_client)?;
    let entry_server_file = find_entry_file(&root_directory, &relative.entry_server)?;

    let client_entries = match &settings.client_entries {
        Some(entries) => entries
            .iter()
            .map(|(name, file)| (name.clone(), root_directory.join(file)))
            .collect(),
        None => {
            let mut entries = BTreeMap::new();
            entries.insert("entry-client".to_string(), entry_client_file.clone());
            entries
        }
    };

    let routes = RouteTableBuilder::new(&routes_directory).build()?;
    let templates = TemplateMap::discover(
        &layouts_directory,
        &sections_directory,
        &partials_directory,
    );

    let markdown_settings = settings.markdown.clone().unwrap_or_default();
    let contents_directory = root_directory.join(
        markdown_settings
            .contents_directory
            .as_deref()
            .unwrap_or("src/contents"),
    );
    let markdown = MarkdownConfig {
        enable: markdown_settings.enable,
        contents: if markdown_settings.enable {
            load_markdown_contents(&contents_directory)
        } else {
            Vec::new()
        },
        contents_directory,
    };

    let custom_watch_directories = settings
        .custom_watch_directories
        .unwrap_or_default()
        .into_iter()
        .map(|dir| root_directory.join(dir))
        .collect();

    debug!(
        routes = routes.len(),
        layouts = templates.layouts.len(),
        "resolved project configuration"
    );

    Ok(TatamiConfig {
        root_directory,
        source_directory,
        routes_directory,
        layouts_directory,
        sections_directory,
        partials_directory,
        theme_directory,
        server_build_directory,
        server_build_path,
        client_build_directory,
        client_public_path,
        entry_client_file,
        entry_server_file,
        client_entries,
        routes,
        templates,
        markdown,
        relative,
        custom_watch_directories,
        mode,
    })
}

impl TatamiConfig {
    /// Whether a path is one of the two entry files.
    pub fn is_entry_point(&self, file: &Path) -> bool {
        file == self.entry_client_file || file == self.entry_server_file
    }

    /// Whether a path lies under the routes directory.
    pub fn is_route_file(&self, file: &Path) -> bool {
        file.starts_with(&self.routes_directory)
    }

    /// Whether a path lies under either build output directory.
    ///
    /// The pipeline's own writes must never feed back into the watcher.
    pub fn is_build_output(&self, file: &Path) -> bool {
        file.starts_with(&self.client_build_directory)
            || file.starts_with(&self.server_build_directory)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Probe `<root>/<basename>.{ts,js}` for an entry file.
fn find_entry_file(root: &Path, basename: &str) -> Result<PathBuf> {
    for ext in ["ts", "js"] {
        let file = root.join(format!("{basename}.{ext}"));
        if file.exists() {
            return Ok(file);
        }
    }
    Err(ConfigError::EntryNotFound {
        basename: basename.to_string(),
        root: root.to_path_buf(),
    })
}

//! Virtual build inputs.
//!
//! Two specifiers are reserved and resolved purely in memory: the aggregate
//! server-build module and the assets-manifest module. A third provider
//! intercepts route source files so empty route modules degrade to a default
//! handler instead of failing the whole cycle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tatami_config::TatamiConfig;

use crate::bundler::{Loader, SourceFile, SourceProvider};
use crate::error::{BuildError, Result};
use crate::manifest::ManifestCell;

/// Specifier of the synthesized server-build aggregate module.
pub const SERVER_BUILD_SPECIFIER: &str = "tatami-server-build";

/// Specifier of the synthesized assets-manifest module.
pub const ASSETS_MANIFEST_SPECIFIER: &str = "tatami-assets-manifest";

/// Module substituted for empty or whitespace-only route files.
const DEFAULT_ROUTE_MODULE: &str = "export default () => null";

/// Synthesizes the server-build aggregate: a single module statically
/// re-exporting the server entry, every route module, every template, the
/// theme, the config, and the assets-manifest virtual module.
pub struct ServerBuildModuleProvider {
    contents: String,
    root: PathBuf,
}

impl ServerBuildModuleProvider {
    pub fn new(config: &TatamiConfig) -> Result<Self> {
        Ok(Self {
            contents: synthesize_server_build(config)?,
            root: config.root_directory.clone(),
        })
    }

    /// The synthesized module source.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn resolve_dir(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SourceProvider for ServerBuildModuleProvider {
    fn resolve(&self, specifier: &str) -> bool {
        specifier == SERVER_BUILD_SPECIFIER
    }

    async fn load(&self, _specifier: &str) -> Result<SourceFile> {
        Ok(SourceFile {
            contents: self.contents.clone(),
            loader: Loader::Js,
        })
    }
}

/// Serializes the current cycle's asset manifest into the server bundle.
///
/// Resolution is lazy: `load` awaits the shared [`ManifestCell`], so the
/// server build observes a manifest at least as fresh as the one computed
/// for its own cycle. When no manifest is available the module degrades to
/// an empty default export.
pub struct AssetsManifestModuleProvider {
    cell: ManifestCell,
}

impl AssetsManifestModuleProvider {
    pub fn new(cell: ManifestCell) -> Self {
        Self { cell }
    }
}

#[async_trait]
impl SourceProvider for AssetsManifestModuleProvider {
    fn resolve(&self, specifier: &str) -> bool {
        specifier == ASSETS_MANIFEST_SPECIFIER
    }

    async fn load(&self, specifier: &str) -> Result<SourceFile> {
        let contents = match self.cell.resolve().await {
            Some(manifest) => {
                let json = serde_json::to_string(&manifest).map_err(|err| {
                    BuildError::VirtualModule(specifier.to_string(), err.to_string())
                })?;
                format!("export default {json};")
            }
            None => "export default {};".to_string(),
        };
        Ok(SourceFile {
            contents,
            loader: Loader::Js,
        })
    }
}

/// Intercepts route source files during the route-modules build.
///
/// Whitespace-only route files load as a minimal default handler; the cycle
/// degrades gracefully instead of failing on a file someone just created.
pub struct RouteModulesProvider {
    route_files: HashSet<PathBuf>,
}

impl RouteModulesProvider {
    pub fn new(config: &TatamiConfig) -> Self {
        Self {
            route_files: config.routes.source_files().into_iter().collect(),
        }
    }
}

#[async_trait]
impl SourceProvider for RouteModulesProvider {
    fn resolve(&self, specifier: &str) -> bool {
        self.route_files.contains(Path::new(specifier))
    }

    async fn load(&self, specifier: &str) -> Result<SourceFile> {
        let contents = tokio::fs::read_to_string(specifier).await?;
        if contents.trim().is_empty() {
            return Ok(SourceFile {
                contents: DEFAULT_ROUTE_MODULE.to_string(),
                loader: Loader::Js,
            });
        }
        let loader = if specifier.ends_with(".ts") {
            Loader::Ts
        } else {
            Loader::Js
        };
        Ok(SourceFile { contents, loader })
    }
}

/// Synthesize the server-build aggregate module source.
fn synthesize_server_build(config: &TatamiConfig) -> Result<String> {
    let mut source = String::new();

    source.push_str(&format!(
        "import * as entryServer from {};\n\n",
        js_string(&config.entry_server_file.to_string_lossy())
    ));

    for (index, route) in config.routes.iter().enumerate() {
        source.push_str(&format!(
            "import * as route_{index} from {};\n",
            js_string(&route.source_file.to_string_lossy())
        ));
    }
    source.push('\n');

    for (index, file) in config.templates.layouts.values().enumerate() {
        source.push_str(&format!(
            "import {{ default as layout_{index} }} from {};\n",
            js_string(&file.to_string_lossy())
        ));
    }
    for (index, file) in config.templates.sections.values().enumerate() {
        source.push_str(&format!(
            "import {{ default as section_{index} }} from {};\n",
            js_string(&file.to_string_lossy())
        ));
    }
    for (index, file) in config.templates.partials.values().enumerate() {
        source.push_str(&format!(
            "import {{ default as partial_{index} }} from {};\n",
            js_string(&file.to_string_lossy())
        ));
    }

    source.push_str(&format!(
        "\nexport {{ default as assets }} from {};\n",
        js_string(ASSETS_MANIFEST_SPECIFIER)
    ));
    source.push_str("\nexport const entry = { module: entryServer };\n");

    source.push_str("\nexport const routes = {\n");
    for (index, route) in config.routes.iter().enumerate() {
        source.push_str(&format!(
            "  {}: {{ id: {}, path: {}, module: route_{index} }},\n",
            js_string(&route.id),
            js_string(&route.id),
            js_string(&route.path)
        ));
    }
    source.push_str("};\n");

    source.push_str("\nexport const templates = {\n");
    push_template_group(&mut source, "layouts", config.templates.layouts.keys(), "layout");
    push_template_group(&mut source, "sections", config.templates.sections.keys(), "section");
    push_template_group(&mut source, "partials", config.templates.partials.keys(), "partial");
    source.push_str("};\n");

    let theme = tatami_config::Theme::load(&config.theme_directory);
    source.push_str(&format!(
        "\nexport const theme = {{ config: {}, locale: {} }};\n",
        serde_json::to_string(&theme.config)?,
        serde_json::to_string(&theme.locale)?
    ));

    source.push_str(&format!(
        "\nexport const config = {};\n",
        serde_json::to_string(config)?
    ));

    Ok(source)
}

fn push_template_group<'a>(
    source: &mut String,
    group: &str,
    names: impl Iterator<Item = &'a String>,
    prefix: &str,
) {
    source.push_str(&format!("  {group}: {{"));
    for (index, name) in names.enumerate() {
        if index > 0 {
            source.push_str(", ");
        }
        source.push_str(&format!("{}: {prefix}_{index}", js_string(name)));
    }
    source.push_str("},\n");
}

/// JSON string escaping doubles as JS string literal escaping here.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, TatamiConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/routes/blog")).unwrap();
        fs::create_dir_all(dir.path().join("src/layouts")).unwrap();
        fs::write(dir.path().join("src/entry-client.ts"), "export {};\n").unwrap();
        fs::write(dir.path().join("src/entry-server.ts"), "export {};\n").unwrap();
        fs::write(dir.path().join("src/routes/index.ts"), "export const get = 1;\n").unwrap();
        fs::write(dir.path().join("src/routes/blog/[slug].ts"), "export const get = 1;\n")
            .unwrap();
        fs::write(dir.path().join("src/layouts/default.html"), "<html></html>").unwrap();
        let config =
            tatami_config::load_config(dir.path(), tatami_config::Mode::Test).unwrap();
        (dir, config)
    }

    #[test]
    fn test_server_build_module_contains_routes_and_templates() {
        let (_dir, config) = project();
        let provider = ServerBuildModuleProvider::new(&config).unwrap();
        let source = provider.contents();

        assert!(source.contains("import * as entryServer from"));
        assert!(source.contains("import * as route_0 from"));
        assert!(source.contains("\"blog/[slug]\""));
        assert!(source.contains("path: \"/blog/:slug\""));
        assert!(source.contains("export { default as assets } from \"tatami-assets-manifest\""));
        assert!(source.contains("layouts: {\"default\": layout_0}"));
        assert!(provider.resolve(SERVER_BUILD_SPECIFIER));
        assert!(!provider.resolve("./something-else"));
    }

    #[tokio::test]
    async fn test_manifest_module_serializes_resolved_manifest() {
        let cell = ManifestCell::new();
        cell.begin_cycle().publish(crate::manifest::AssetManifest {
            version: "abc".into(),
            entries: Default::default(),
            url: None,
        });

        let provider = AssetsManifestModuleProvider::new(cell);
        let file = provider.load(ASSETS_MANIFEST_SPECIFIER).await.unwrap();
        assert!(file.contents.starts_with("export default {"));
        assert!(file.contents.contains("\"version\":\"abc\""));
    }

    #[tokio::test]
    async fn test_manifest_module_empty_when_unavailable() {
        let provider = AssetsManifestModuleProvider::new(ManifestCell::new());
        let file = provider.load(ASSETS_MANIFEST_SPECIFIER).await.unwrap();
        assert_eq!(file.contents, "export default {};");
    }

    #[tokio::test]
    async fn test_blank_route_file_degrades_to_default_handler() {
        let (_dir, config) = project();
        fs::write(config.routes_directory.join("blank.ts"), "   \n\t\n").unwrap();
        let config =
            tatami_config::load_config(&config.root_directory, tatami_config::Mode::Test)
                .unwrap();

        let provider = RouteModulesProvider::new(&config);
        let blank = config.routes_directory.join("blank.ts");
        assert!(provider.resolve(&blank.to_string_lossy()));

        let file = provider.load(&blank.to_string_lossy()).await.unwrap();
        assert_eq!(file.contents, DEFAULT_ROUTE_MODULE);

        let index = config.routes_directory.join("index.ts");
        let file = provider.load(&index.to_string_lossy()).await.unwrap();
        assert!(file.contents.contains("export const get"));
    }
}

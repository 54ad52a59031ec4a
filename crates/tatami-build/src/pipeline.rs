//! The bundle pipeline.
//!
//! One build cycle runs three compilation units and the manifest generation:
//!
//! 1. the client (browser) bundle, chained into the asset manifest whose
//!    computation is published to the shared [`ManifestCell`] *before* it
//!    resolves;
//! 2. the route-modules bundle, one server-targeted entry per route;
//! 3. the server bundle, whose virtual assets-manifest module awaits the
//!    cell and whose outputs are post-processed before hitting disk.
//!
//! If any unit fails, the failure is reported through the supplied callback
//! and nothing is published; the pipeline never partially publishes
//! artifacts and never throws past its own boundary.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error};

use tatami_config::{Mode, TatamiConfig};

use crate::bundler::{
    BundleHandle, BundleJob, Bundler, EntryPoints, OutputFile, Platform,
};
use crate::error::{BuildError, Result};
use crate::manifest::{generate_assets_manifest, ManifestCell};
use crate::virtual_modules::{
    AssetsManifestModuleProvider, RouteModulesProvider, ServerBuildModuleProvider,
};

/// Source-tagging prefix stripped from emitted source maps so debugger
/// breakpoints resolve against the real files.
static ROUTE_SOURCE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r#""route:"#).unwrap());

/// Options for one build or watch session.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: Mode,
    /// Server target token handed to the bundler, e.g. `node18`.
    pub target: String,
    pub sourcemap: bool,
    /// Request incremental rebuild handles from the bundler.
    pub incremental: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            target: "node18".to_string(),
            sourcemap: false,
            incremental: false,
        }
    }
}

/// Callback invoked with every failure the pipeline swallows.
pub type FailureHandler = Arc<dyn Fn(&BuildError) + Send + Sync>;

/// Default failure handler: log and move on.
pub fn log_failure() -> FailureHandler {
    Arc::new(|err| error!(%err, "build failed"))
}

/// Coordinates the three compilation units around a pluggable [`Bundler`].
pub struct BundlePipeline {
    bundler: Arc<dyn Bundler>,
}

impl BundlePipeline {
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self { bundler }
    }

    /// Run one full build cycle.
    ///
    /// Returns the client and server bundle handles, or `(None, None)` when
    /// any unit failed; the failure has already been reported through
    /// `on_failure` by then.
    pub async fn build_everything(
        &self,
        config: &TatamiConfig,
        options: &BuildOptions,
        cell: &ManifestCell,
        on_failure: &FailureHandler,
    ) -> (Option<BundleHandle>, Option<BundleHandle>) {
        let publisher = cell.begin_cycle();

        let client_fut = async {
            let output = self.client_build(config, options).await?;
            match generate_assets_manifest(config, &output.metafile).await {
                Ok(manifest) => {
                    publisher.publish(manifest);
                    Ok(output)
                }
                Err(err) => {
                    publisher.fail();
                    Err(err)
                }
            }
        };
        let routes_fut = self.route_modules_build(config, options);
        let server_fut = self.server_build(config, options, cell);

        let (client, routes, server) = tokio::join!(client_fut, routes_fut, server_fut);

        match (client, routes, server) {
            (Ok(client), Ok(routes), Ok(server)) => {
                // Route modules are never rebuilt incrementally; release
                // their compile state right away.
                BundleHandle::from_output(routes).dispose();
                debug!("build cycle complete");
                (
                    Some(BundleHandle::from_output(client)),
                    Some(BundleHandle::from_output(server)),
                )
            }
            (client, routes, server) => {
                // Units that did succeed may hold live incremental state;
                // release it before reporting the cycle as failed.
                let mut settle = |result: Result<crate::bundler::BundleOutput>| match result {
                    Ok(output) => BundleHandle::from_output(output).dispose(),
                    Err(err) => on_failure(&err),
                };
                settle(client);
                settle(routes);
                settle(server);
                (None, None)
            }
        }
    }

    /// Browser-targeted, code-split client bundle with content-hashed names.
    async fn client_build(
        &self,
        config: &TatamiConfig,
        options: &BuildOptions,
    ) -> Result<crate::bundler::BundleOutput> {
        let entries = config
            .client_entries
            .iter()
            .map(|(name, file)| (name.clone(), file.clone()))
            .collect();

        let mut job = BundleJob::new(Platform::Browser, EntryPoints::Named(entries));
        job.outdir = Some(config.client_build_directory.clone());
        job.write = true;
        job.splitting = true;
        job.sourcemap = options.sourcemap;
        job.minify = options.mode == Mode::Production;
        job.incremental = options.incremental;
        job.entry_names = Some("[dir]/[name]-[hash]".to_string());
        job.public_path = Some(config.client_public_path.clone());

        self.bundler.bundle(job).await
    }

    /// Server-targeted bundle of each route module in isolation.
    async fn route_modules_build(
        &self,
        config: &TatamiConfig,
        options: &BuildOptions,
    ) -> Result<crate::bundler::BundleOutput> {
        let entries = config
            .routes
            .iter()
            .map(|route| (route.id.clone(), route.source_file.clone()))
            .collect();

        let mut job = BundleJob::new(Platform::Server, EntryPoints::Named(entries));
        job.outdir = Some(config.server_build_directory.join("_routes"));
        job.write = true;
        job.sourcemap = options.sourcemap;
        job.minify = options.mode == Mode::Production;
        job.incremental = options.incremental;
        job.target = Some(options.target.clone());
        job.providers = vec![Arc::new(RouteModulesProvider::new(config))];

        self.bundler.bundle(job).await
    }

    /// The server bundle: a virtual root re-exporting the server-build
    /// aggregate, with the manifest module resolved lazily from the cell.
    async fn server_build(
        &self,
        config: &TatamiConfig,
        options: &BuildOptions,
        cell: &ManifestCell,
    ) -> Result<crate::bundler::BundleOutput> {
        let aggregate = ServerBuildModuleProvider::new(config)?;
        let root_contents = format!(
            "export * from {};",
            serde_json::to_string(crate::virtual_modules::SERVER_BUILD_SPECIFIER)?
        );

        let mut job = BundleJob::new(
            Platform::Server,
            EntryPoints::Virtual {
                contents: root_contents,
                resolve_dir: config.root_directory.clone(),
            },
        );
        job.outfile = Some(config.server_build_path.clone());
        job.write = false;
        job.sourcemap = options.sourcemap;
        job.minify = options.mode == Mode::Production;
        job.incremental = options.incremental;
        job.target = Some(options.target.clone());
        job.providers = vec![
            Arc::new(aggregate),
            Arc::new(AssetsManifestModuleProvider::new(cell.clone())),
        ];

        let output = self.bundler.bundle(job).await?;
        write_server_build_result(config, &output.output_files).await?;
        Ok(output)
    }
}

/// Convenience: one non-incremental build, as the CLI `build` command runs.
pub async fn build(
    bundler: Arc<dyn Bundler>,
    config: &TatamiConfig,
    options: &BuildOptions,
    on_failure: &FailureHandler,
) -> bool {
    let cell = ManifestCell::new();
    let pipeline = BundlePipeline::new(bundler);
    let (client, server) = pipeline
        .build_everything(config, options, &cell, on_failure)
        .await;
    client.is_some() && server.is_some()
}

/// Write the finalized server bundle, fixing up embedded references.
///
/// `.js` outputs get their `sourceMappingURL` rewritten to the bare
/// filename (relative to the output directory instead of the build root);
/// `.map` outputs get the internal route source tag stripped.
pub async fn write_server_build_result(
    config: &TatamiConfig,
    output_files: &[OutputFile],
) -> Result<()> {
    if let Some(parent) = config.server_build_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    for file in output_files {
        let path_str = file.path.to_string_lossy();
        if path_str.ends_with(".js") {
            let contents = String::from_utf8_lossy(&file.contents);
            let rewritten = rewrite_source_mapping_url(&contents, &file.path);
            tokio::fs::write(&file.path, rewritten.as_bytes()).await?;
        } else if path_str.ends_with(".map") {
            let contents = String::from_utf8_lossy(&file.contents);
            let rewritten = ROUTE_SOURCE_TAG.replace_all(&contents, "\"");
            tokio::fs::write(&file.path, rewritten.as_bytes()).await?;
        } else {
            tokio::fs::write(&file.path, &file.contents).await?;
        }
    }
    Ok(())
}

/// Rewrite `//# sourceMappingURL=<anything>/<filename>.map` to the bare
/// `<filename>.map`.
fn rewrite_source_mapping_url(contents: &str, output_path: &Path) -> String {
    let Some(filename) = output_path.file_name().and_then(|n| n.to_str()) else {
        return contents.to_string();
    };
    let map_name = format!("{filename}.map");
    let pattern = format!(
        "(//# sourceMappingURL=)(.*){}",
        regex::escape(&map_name)
    );
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace(contents, format!("${{1}}{map_name}"))
            .into_owned(),
        Err(_) => contents.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_source_mapping_url_rewritten_to_bare_filename() {
        let contents = "const x = 1;\n//# sourceMappingURL=/project/.tatami/server/index.js.map\n";
        let rewritten =
            rewrite_source_mapping_url(contents, &PathBuf::from("/project/.tatami/server/index.js"));
        assert!(rewritten.ends_with("//# sourceMappingURL=index.js.map\n"));
    }

    #[test]
    fn test_route_tag_stripped_from_maps() {
        let map = r#"{"sources":["route:src/routes/index.ts","src/lib.ts"]}"#;
        let stripped = ROUTE_SOURCE_TAG.replace_all(map, "\"");
        assert_eq!(
            stripped,
            r#"{"sources":["src/routes/index.ts","src/lib.ts"]}"#
        );
    }
}

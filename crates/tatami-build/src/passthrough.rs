//! A minimal conforming [`Bundler`].
//!
//! No transpilation, no tree shaking, no code splitting: each entry is
//! loaded (through the job's providers when one claims the specifier),
//! provider-owned imports are inlined textually, and the result is emitted
//! under a content-hashed name. Enough to exercise the whole orchestration
//! and to serve small projects whose sources are plain JavaScript.

use std::path::PathBuf;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::bundler::{
    BundleJob, BundleOutput, Bundler, BuildMetafile, EntryPoints, MetaOutput, OutputFile,
    RebuildHandle, SourceProvider,
};
use crate::error::{BuildError, Result};

/// `import`/`export ... from "specifier"` statements, one per line.
static MODULE_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\b[^;'"]*?(?:from\s*)?["']([^"']+)["'];?\s*$"#)
        .unwrap()
});

/// Inlining depth cap. Provider graphs here are two levels deep at most; a
/// cycle would otherwise recurse forever.
const MAX_INLINE_DEPTH: usize = 8;

#[derive(Debug, Default)]
pub struct PassthroughBundler;

impl PassthroughBundler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Bundler for PassthroughBundler {
    async fn bundle(&self, job: BundleJob) -> Result<BundleOutput> {
        let mut output = run_job(&job).await?;
        if job.incremental {
            output.rebuild = Some(Box::new(PassthroughRebuild { job }));
        }
        Ok(output)
    }
}

/// Re-runs the whole job. Passthrough compilation is cheap enough that
/// "incremental" and "full" are the same work; the value of the handle is
/// keeping the orchestration's incremental path exercised.
struct PassthroughRebuild {
    job: BundleJob,
}

#[async_trait]
impl RebuildHandle for PassthroughRebuild {
    async fn rebuild(&mut self) -> Result<BundleOutput> {
        run_job(&self.job).await
    }

    fn dispose(&mut self) {}
}

async fn run_job(job: &BundleJob) -> Result<BundleOutput> {
    let mut metafile = BuildMetafile::default();
    let mut output_files = Vec::new();

    match &job.entry_points {
        EntryPoints::Named(entries) => {
            for (name, file) in entries {
                let specifier = file.to_string_lossy().into_owned();
                let source = load_source(job, &specifier).await?;
                let bundled = inline_providers(job, source, 0).await?;
                let output_path = named_output_path(job, name, &bundled)?;
                emit(
                    job,
                    &mut metafile,
                    &mut output_files,
                    output_path,
                    bundled,
                    Some(file.clone()),
                )
                .await?;
            }
        }
        EntryPoints::Virtual { contents, .. } => {
            let bundled = inline_providers(job, contents.clone(), 0).await?;
            let output_path = job.outfile.clone().ok_or_else(|| {
                BuildError::Bundler("virtual entry requires an output file".into())
            })?;
            emit(job, &mut metafile, &mut output_files, output_path, bundled, None).await?;
        }
    }

    Ok(BundleOutput {
        metafile,
        output_files,
        rebuild: None,
    })
}

/// Load a specifier through the job's providers, falling back to the
/// filesystem.
async fn load_source(job: &BundleJob, specifier: &str) -> Result<String> {
    for provider in &job.providers {
        if provider.resolve(specifier) {
            return Ok(provider.load(specifier).await?.contents);
        }
    }
    Ok(tokio::fs::read_to_string(specifier).await?)
}

/// Replace provider-owned import statements with the provider module's
/// contents, recursively.
async fn inline_providers(job: &BundleJob, source: String, depth: usize) -> Result<String> {
    if depth >= MAX_INLINE_DEPTH {
        return Err(BuildError::Bundler(format!(
            "module inlining exceeded depth {MAX_INLINE_DEPTH}"
        )));
    }

    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for capture in MODULE_STATEMENT.captures_iter(&source) {
        // Group 0 always exists.
        let statement = capture.get(0).expect("whole match");
        let specifier = &capture[1];
        let Some(provider) = owning_provider(job, specifier) else {
            continue;
        };
        result.push_str(&source[cursor..statement.start()]);
        let loaded = provider.load(specifier).await?.contents;
        let inlined = Box::pin(inline_providers(job, loaded, depth + 1)).await?;
        result.push_str(&inlined);
        result.push('\n');
        cursor = statement.end();
    }
    result.push_str(&source[cursor..]);
    Ok(result)
}

fn owning_provider<'a>(
    job: &'a BundleJob,
    specifier: &str,
) -> Option<&'a std::sync::Arc<dyn SourceProvider>> {
    job.providers.iter().find(|p| p.resolve(specifier))
}

/// Render the output path for a named entry: the `entry_names` pattern with
/// `[name]` and `[hash]` substituted, under the job's output directory.
fn named_output_path(job: &BundleJob, name: &str, contents: &str) -> Result<PathBuf> {
    let outdir = job
        .outdir
        .clone()
        .ok_or_else(|| BuildError::Bundler("named entries require an output directory".into()))?;

    let pattern = job.entry_names.as_deref().unwrap_or("[name]");
    let rendered = pattern
        .replace("[dir]/", "")
        .replace("[dir]", "")
        .replace("[name]", name)
        .replace("[hash]", &content_hash(contents));
    Ok(outdir.join(format!("{rendered}.js")))
}

/// First eight hex digits of the content's SHA-256, uppercased.
fn content_hash(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_uppercase()
}

async fn emit(
    job: &BundleJob,
    metafile: &mut BuildMetafile,
    output_files: &mut Vec<OutputFile>,
    output_path: PathBuf,
    mut contents: String,
    entry_point: Option<PathBuf>,
) -> Result<()> {
    if job.sourcemap {
        let map_path = sibling_map_path(&output_path);
        let map = format!(
            r#"{{"version":3,"sources":{},"mappings":""}}"#,
            serde_json::to_string(&[entry_point
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()])?
        );
        contents.push_str(&format!(
            "\n//# sourceMappingURL={}\n",
            map_path.display()
        ));
        push_output(job, output_files, map_path, map.into_bytes()).await?;
    }

    metafile.outputs.insert(
        output_path.to_string_lossy().into_owned(),
        MetaOutput {
            entry_point,
            imports: Vec::new(),
        },
    );
    push_output(job, output_files, output_path, contents.into_bytes()).await
}

async fn push_output(
    job: &BundleJob,
    output_files: &mut Vec<OutputFile>,
    path: PathBuf,
    contents: Vec<u8>,
) -> Result<()> {
    if job.write {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &contents).await?;
    }
    output_files.push(OutputFile { path, contents });
    Ok(())
}

fn sibling_map_path(output_path: &PathBuf) -> PathBuf {
    let mut map = output_path.clone().into_os_string();
    map.push(".map");
    PathBuf::from(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Loader, Platform, SourceFile};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedProvider {
        specifier: &'static str,
        contents: &'static str,
    }

    #[async_trait]
    impl SourceProvider for FixedProvider {
        fn resolve(&self, specifier: &str) -> bool {
            specifier == self.specifier
        }

        async fn load(&self, _specifier: &str) -> Result<SourceFile> {
            Ok(SourceFile {
                contents: self.contents.to_string(),
                loader: Loader::Js,
            })
        }
    }

    #[tokio::test]
    async fn test_named_entry_emits_hashed_output() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("entry.js");
        fs::write(&entry, "console.log(1);\n").unwrap();

        let mut job = BundleJob::new(
            Platform::Browser,
            EntryPoints::Named(vec![("app".to_string(), entry.clone())]),
        );
        job.outdir = Some(dir.path().join("out"));
        job.entry_names = Some("[dir]/[name]-[hash]".to_string());

        let output = PassthroughBundler::new().bundle(job).await.unwrap();
        assert_eq!(output.output_files.len(), 1);
        let path = &output.output_files[0].path;
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("app-") && name.ends_with(".js"));
        assert!(path.exists());

        let meta = output.metafile.outputs.values().next().unwrap();
        assert_eq!(meta.entry_point.as_deref(), Some(entry.as_path()));
    }

    #[tokio::test]
    async fn test_same_contents_same_hash() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 8);
    }

    #[tokio::test]
    async fn test_provider_imports_inlined_recursively() {
        let dir = TempDir::new().unwrap();

        let mut job = BundleJob::new(
            Platform::Server,
            EntryPoints::Virtual {
                contents: "export * from \"outer\";\n".to_string(),
                resolve_dir: dir.path().to_path_buf(),
            },
        );
        job.outfile = Some(dir.path().join("out/index.js"));
        job.write = false;
        job.providers = vec![
            Arc::new(FixedProvider {
                specifier: "outer",
                contents: "import inner from \"inner\";\nexport const a = inner;\n",
            }),
            Arc::new(FixedProvider {
                specifier: "inner",
                contents: "const value = 42;\n",
            }),
        ];

        let output = PassthroughBundler::new().bundle(job).await.unwrap();
        let bundled = String::from_utf8(output.output_files[0].contents.clone()).unwrap();
        assert!(bundled.contains("const value = 42;"));
        assert!(bundled.contains("export const a"));
        assert!(!bundled.contains("from \"outer\""));
        assert!(!bundled.contains("from \"inner\""));
        // write = false leaves the disk untouched.
        assert!(!dir.path().join("out/index.js").exists());
    }

    #[tokio::test]
    async fn test_incremental_handle_reruns_job() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("entry.js");
        fs::write(&entry, "export const v = 1;\n").unwrap();

        let mut job = BundleJob::new(
            Platform::Server,
            EntryPoints::Named(vec![("entry".to_string(), entry.clone())]),
        );
        job.outdir = Some(dir.path().join("out"));
        job.incremental = true;

        let mut output = PassthroughBundler::new().bundle(job).await.unwrap();
        let mut rebuild = output.rebuild.take().expect("incremental handle");

        fs::write(&entry, "export const v = 2;\n").unwrap();
        let second = rebuild.rebuild().await.unwrap();
        let bundled = String::from_utf8(second.output_files[0].contents.clone()).unwrap();
        assert!(bundled.contains("v = 2"));
    }
}

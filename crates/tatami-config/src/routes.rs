//! Route table construction from the routes source directory.
//!
//! Each `.js`/`.ts` file under the routes directory becomes one
//! [`RouteEntry`]: the `id` is its slash-normalized relative path with the
//! extension stripped, and the `path` is the URL template derived from the id.
//! The table is ordered, keyed by id, and rebuilt wholesale on every full
//! build cycle; it is never mutated in place.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{ConfigError, Result};

/// Bracket segments: `[name]` and the catch-all form `[...name]`.
///
/// Both collapse to `:name`, losing the catch-all distinction; see
/// DESIGN.md before "fixing" it.
static BRACKET_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:\.{3})?(\w+?)\]").unwrap());

/// Source extensions recognized as route modules.
const ROUTE_EXTENSIONS: &[&str] = &["js", "ts"];

/// One file-derived route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Normalized, slash-separated id (relative path, extension stripped).
    pub id: String,
    /// URL template, e.g. `/blog/:slug`.
    pub path: String,
    /// Absolute path of the backing source file.
    pub source_file: PathBuf,
}

/// Ordered mapping from route id to entry.
///
/// Immutable after construction; replaced wholesale on rebuild so concurrent
/// readers never observe a half-updated table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    entries: IndexMap<String, RouteEntry>,
}

impl RouteTable {
    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&RouteEntry> {
        self.entries.get(id)
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All backing source files, in table order.
    pub fn source_files(&self) -> Vec<PathBuf> {
        self.entries.values().map(|e| e.source_file.clone()).collect()
    }
}

/// Walks a routes directory into a [`RouteTable`].
pub struct RouteTableBuilder {
    routes_directory: PathBuf,
}

impl RouteTableBuilder {
    pub fn new(routes_directory: impl Into<PathBuf>) -> Self {
        Self {
            routes_directory: routes_directory.into(),
        }
    }

    /// Build the table.
    ///
    /// Directories are walked transparently; only recognized source
    /// extensions are visited. A missing routes directory yields an empty
    /// table. Two files normalizing to the same id is a
    /// [`ConfigError::DuplicateRouteId`].
    pub fn build(&self) -> Result<RouteTable> {
        let mut entries: IndexMap<String, RouteEntry> = IndexMap::new();

        if !self.routes_directory.exists() {
            return Ok(RouteTable { entries });
        }

        for walked in WalkDir::new(&self.routes_directory)
            .sort_by_file_name()
            .into_iter()
        {
            let walked = walked.map_err(|e| {
                ConfigError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("route walk failed")
                }))
            })?;
            if !walked.file_type().is_file() {
                continue;
            }
            let file = walked.path();
            if !has_route_extension(file) {
                continue;
            }

            let relative = file
                .strip_prefix(&self.routes_directory)
                .unwrap_or(file)
                .to_path_buf();
            let id = route_id(&relative);
            let path = route_path_from_id(&id);

            let entry = RouteEntry {
                id: id.clone(),
                path,
                source_file: file.to_path_buf(),
            };
            if let Some(existing) = entries.insert(id.clone(), entry) {
                return Err(ConfigError::DuplicateRouteId {
                    id,
                    first: existing.source_file,
                    second: file.to_path_buf(),
                });
            }
        }

        Ok(RouteTable { entries })
    }
}

fn has_route_extension(file: &Path) -> bool {
    file.extension()
        .and_then(|e| e.to_str())
        .map(|e| ROUTE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Normalized id for a route file path relative to the routes directory.
pub fn route_id(relative: &Path) -> String {
    let slashed = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    strip_file_extension(&slashed)
}

fn strip_file_extension(file: &str) -> String {
    match file.rfind('.') {
        Some(dot) if file[dot + 1..].chars().all(|c| c.is_ascii_alphanumeric()) => {
            file[..dot].to_string()
        }
        _ => file.to_string(),
    }
}

/// Derive the URL template for a route id.
///
/// In order: strip a trailing `index` suffix (case-insensitive), lowercase
/// the first word-leading uppercase letter, rewrite bracket segments to
/// `:name`, and drop a trailing slash unless the result is the root.
pub fn route_path_from_id(id: &str) -> String {
    let mut path = format!("/{id}");

    let lower = path.to_ascii_lowercase();
    if lower.ends_with("index") {
        path.truncate(path.len() - "index".len());
    }

    path = lowercase_first_word_capital(&path);
    path = BRACKET_SEGMENT.replace_all(&path, ":$1").into_owned();

    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Lowercase the first uppercase letter that sits at a word boundary.
///
/// Equivalent to a non-global `\b[A-Z]` replace: only the first such
/// letter in the whole string changes, later segments keep their casing.
fn lowercase_first_word_capital(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev: Option<char> = None;
    let mut done = false;
    for c in path.chars() {
        let boundary = prev.map_or(true, |p| !(p.is_ascii_alphanumeric() || p == '_'));
        if !done && boundary && c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
            done = true;
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let file = dir.join(rel);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, "export const get = () => null;\n").unwrap();
    }

    #[test]
    fn test_static_path_is_slash_plus_id() {
        assert_eq!(route_path_from_id("about"), "/about");
        assert_eq!(route_path_from_id("blog/archive"), "/blog/archive");
    }

    #[test]
    fn test_index_segment_stripped() {
        assert_eq!(route_path_from_id("index"), "/");
        assert_eq!(route_path_from_id("blog/index"), "/blog");
        assert_eq!(route_path_from_id("blog/Index"), "/blog");
    }

    #[test]
    fn test_no_trailing_slash_except_root() {
        assert_eq!(route_path_from_id("index"), "/");
        assert!(!route_path_from_id("docs/index").ends_with('/'));
    }

    #[test]
    fn test_bracket_segment_becomes_param() {
        assert_eq!(route_path_from_id("blog/[slug]"), "/blog/:slug");
        assert_eq!(route_path_from_id("[id]/edit"), "/:id/edit");
    }

    #[test]
    fn test_catch_all_collapses_to_plain_param() {
        // [...rest] and [rest] intentionally produce the same template.
        assert_eq!(route_path_from_id("docs/[...rest]"), "/docs/:rest");
        assert_eq!(
            route_path_from_id("docs/[...rest]"),
            route_path_from_id("docs/[rest]")
        );
    }

    #[test]
    fn test_first_word_capital_lowercased() {
        // First `\b[A-Z]` anywhere in the string, not just position zero.
        assert_eq!(route_path_from_id("About"), "/about");
        assert_eq!(route_path_from_id("About/Team"), "/about/Team");
        // A strict "first character of the whole string" rule would leave
        // both capitals alone (the first character is `/`).
        assert_ne!(route_path_from_id("About"), "/About");
    }

    #[test]
    fn test_route_id_normalizes_and_strips_extension() {
        assert_eq!(route_id(Path::new("blog/post.ts")), "blog/post");
        assert_eq!(route_id(Path::new("index.js")), "index");
    }

    #[test]
    fn test_builder_walks_nested_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.ts");
        touch(dir.path(), "about.ts");
        touch(dir.path(), "blog/[slug].ts");
        touch(dir.path(), "blog/readme.txt");

        let table = RouteTableBuilder::new(dir.path()).build().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("index").unwrap().path, "/");
        assert_eq!(table.get("about").unwrap().path, "/about");
        assert_eq!(table.get("blog/[slug]").unwrap().path, "/blog/:slug");
    }

    #[test]
    fn test_duplicate_id_is_config_error() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "about.ts");
        touch(dir.path(), "about.js");

        let err = RouteTableBuilder::new(dir.path()).build().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRouteId { ref id, .. } if id == "about"));
    }

    #[test]
    fn test_missing_directory_yields_empty_table() {
        let dir = TempDir::new().unwrap();
        let table = RouteTableBuilder::new(dir.path().join("routes"))
            .build()
            .unwrap();
        assert!(table.is_empty());
    }
}

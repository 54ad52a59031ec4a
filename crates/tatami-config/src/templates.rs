//! Template file discovery.
//!
//! Layouts, sections, and partials each live in a flat directory; files with
//! a template extension are registered under a kebab-cased name.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Extensions recognized as template sources.
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "njk", "nj"];

/// Name-to-file maps for the three template families.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMap {
    pub layouts: IndexMap<String, PathBuf>,
    pub sections: IndexMap<String, PathBuf>,
    pub partials: IndexMap<String, PathBuf>,
}

impl TemplateMap {
    /// Discover templates under the three configured directories.
    pub fn discover(layouts: &Path, sections: &Path, partials: &Path) -> Self {
        Self {
            layouts: scan_directory(layouts),
            sections: scan_directory(sections),
            partials: scan_directory(partials),
        }
    }

    /// Whether the extension marks a template-family file.
    ///
    /// Markdown counts: content edits must restart the build like any other
    /// template change.
    pub fn is_template_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| TEMPLATE_EXTENSIONS.contains(&e) || e == "md")
            .unwrap_or(false)
    }
}

fn scan_directory(dir: &Path) -> IndexMap<String, PathBuf> {
    let mut templates = IndexMap::new();
    let Ok(listing) = std::fs::read_dir(dir) else {
        return templates;
    };
    let mut files: Vec<PathBuf> = listing.flatten().map(|entry| entry.path()).collect();
    files.sort();
    for file in files {
        let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !TEMPLATE_EXTENSIONS.contains(&ext) {
            continue;
        }
        if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
            templates.insert(template_name(stem), file.clone());
        }
    }
    templates
}

/// Kebab-case a template stem: separators and inner dots become dashes,
/// camel humps split.
fn template_name(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut prev_lower = false;
    for c in stem.chars() {
        match c {
            '.' | '_' | ' ' => {
                if !out.ends_with('-') {
                    out.push('-');
                }
                prev_lower = false;
            }
            c if c.is_ascii_uppercase() => {
                if prev_lower && !out.ends_with('-') {
                    out.push('-');
                }
                out.push(c.to_ascii_lowercase());
                prev_lower = false;
            }
            c => {
                out.push(c);
                prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            }
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_template_name_kebab() {
        assert_eq!(template_name("default"), "default");
        assert_eq!(template_name("myLayout"), "my-layout");
        assert_eq!(template_name("error.page"), "error-page");
    }

    #[test]
    fn test_discover_filters_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("404.njk"), "not found").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let map = TemplateMap::discover(dir.path(), &dir.path().join("x"), &dir.path().join("y"));
        assert_eq!(map.layouts.len(), 2);
        assert!(map.layouts.contains_key("default"));
        assert!(map.layouts.contains_key("404"));
        assert!(map.sections.is_empty());
    }

    #[test]
    fn test_markdown_counts_as_template_family() {
        assert!(TemplateMap::is_template_file(Path::new("posts/hello.md")));
        assert!(TemplateMap::is_template_file(Path::new("layouts/base.html")));
        assert!(!TemplateMap::is_template_file(Path::new("src/entry.ts")));
    }
}

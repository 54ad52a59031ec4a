//! Front-matter markdown content map.
//!
//! Projects can keep a directory of markdown documents whose parsed front
//! matter and body are exposed to every render context. The map is opt-in
//! (`[markdown] enable = true` in `tatami.toml`) and rebuilt with the rest
//! of the configuration on restart-class changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;

/// Resolved markdown content settings plus the loaded documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkdownConfig {
    pub enable: bool,
    pub contents_directory: PathBuf,
    pub contents: Vec<MarkdownContent>,
}

/// One markdown document, front matter split off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownContent {
    /// Slash-normalized path relative to the contents directory, `.md`
    /// stripped.
    pub key: String,
    /// Parsed front matter; an empty object when the document has none.
    pub data: Value,
    /// Document body with the front matter block removed.
    pub content: String,
}

/// Load every `.md` file under a contents directory, in walk order.
///
/// A missing directory yields an empty map. An unreadable file is skipped
/// with a warning; a file with unparseable front matter degrades to plain
/// content rather than failing config resolution.
pub fn load_markdown_contents(dir: &Path) -> Vec<MarkdownContent> {
    let mut contents = Vec::new();
    if !dir.exists() {
        return contents;
    }

    for walked in WalkDir::new(dir).sort_by_file_name().into_iter().flatten() {
        if !walked.file_type().is_file() {
            continue;
        }
        let file = walked.path();
        if file.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                warn!(file = %file.display(), %err, "markdown content unreadable");
                continue;
            }
        };

        let relative = file.strip_prefix(dir).unwrap_or(file);
        let key = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let (data, body) = split_front_matter(&source);
        contents.push(MarkdownContent {
            key,
            data,
            content: body.to_string(),
        });
    }
    contents
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Split a leading `---` fenced YAML block off a document.
///
/// Returns the parsed front matter and the remaining body. Documents
/// without a fence, with an unterminated fence, or with unparseable YAML
/// come back whole with empty front matter.
fn split_front_matter(source: &str) -> (Value, &str) {
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return (empty_object(), source);
    };
    let Some(end) = rest.find("\n---") else {
        return (empty_object(), source);
    };

    let raw = &rest[..end];
    let after = &rest[end + "\n---".len()..];
    // The closing fence must end its own line.
    if !(after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n")) {
        return (empty_object(), source);
    }
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    if raw.trim().is_empty() {
        return (empty_object(), body);
    }
    match serde_saphyr::from_str::<Value>(raw) {
        Ok(data) => (data, body),
        Err(err) => {
            warn!(%err, "front matter unparseable, keeping document whole");
            (empty_object(), source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_front_matter_split_off_body() {
        let (data, body) =
            split_front_matter("---\ntitle: Hello\ndraft: true\n---\n# Heading\n");
        assert_eq!(data, json!({ "title": "Hello", "draft": true }));
        assert_eq!(body, "# Heading\n");
    }

    #[test]
    fn test_document_without_fence_kept_whole() {
        let (data, body) = split_front_matter("# Just markdown\n");
        assert_eq!(data, json!({}));
        assert_eq!(body, "# Just markdown\n");
    }

    #[test]
    fn test_unterminated_fence_kept_whole() {
        let source = "---\ntitle: Hello\nno closing fence\n";
        let (data, body) = split_front_matter(source);
        assert_eq!(data, json!({}));
        assert_eq!(body, source);
    }

    #[test]
    fn test_bad_yaml_degrades_to_plain_content() {
        let source = "---\ntitle: [unclosed\n---\nbody\n";
        let (data, body) = split_front_matter(source);
        assert_eq!(data, json!({}));
        assert_eq!(body, source);
    }

    #[test]
    fn test_loads_nested_files_with_relative_keys() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("guides")).unwrap();
        fs::write(
            dir.path().join("welcome.md"),
            "---\ntitle: Welcome\n---\nHello there.\n",
        )
        .unwrap();
        fs::write(dir.path().join("guides/setup.md"), "Setup steps.\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not markdown").unwrap();

        let contents = load_markdown_contents(dir.path());
        assert_eq!(contents.len(), 2);

        let setup = contents.iter().find(|c| c.key == "guides/setup").unwrap();
        assert_eq!(setup.content, "Setup steps.\n");
        assert_eq!(setup.data, json!({}));

        let welcome = contents.iter().find(|c| c.key == "welcome").unwrap();
        assert_eq!(welcome.data["title"], "Welcome");
        assert_eq!(welcome.content, "Hello there.\n");
    }

    #[test]
    fn test_missing_directory_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        assert!(load_markdown_contents(&dir.path().join("contents")).is_empty());
    }
}

//! Theme data loading.
//!
//! The theme directory holds JSON files: `config.*.json` for theme settings
//! and `locale.*.json` for translations (`locale.default.json` forms the
//! root locale, other locale files nest under their name). Unparseable JSON
//! degrades to an empty object; the theme never fails a build.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Theme configuration and locale tables embedded into the server build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub config: Value,
    pub locale: Value,
}

impl Theme {
    /// Load theme data from a directory. Missing directory yields the
    /// default (empty) theme.
    pub fn load(dir: &Path) -> Self {
        let mut config = Value::Object(Map::new());
        let mut locale = Map::new();

        let Ok(listing) = std::fs::read_dir(dir) else {
            return Theme::default();
        };
        let mut files: Vec<_> = listing.flatten().map(|entry| entry.path()).collect();
        files.sort();

        for file in files {
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with("config.") {
                config = read_json_or_empty(&file);
            } else if name.starts_with("locale.") {
                let value = read_json_or_empty(&file);
                if name.contains(".default.") {
                    if let Value::Object(map) = value {
                        for (k, v) in map {
                            locale.insert(k, v);
                        }
                    }
                } else {
                    let key = name
                        .trim_start_matches("locale.")
                        .trim_end_matches(".json")
                        .to_string();
                    locale.insert(key, value);
                }
            }
        }

        Theme {
            config,
            locale: Value::Object(locale),
        }
    }
}

fn read_json_or_empty(file: &Path) -> Value {
    match std::fs::read_to_string(file) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(file = %file.display(), %err, "invalid theme JSON, using empty object");
            Value::Object(Map::new())
        }),
        Err(_) => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_empty_theme() {
        let theme = Theme::load(Path::new("/nonexistent/theme"));
        assert_eq!(theme, Theme::default());
    }

    #[test]
    fn test_config_and_locales_loaded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.base.json"), r#"{"accent":"red"}"#).unwrap();
        fs::write(dir.path().join("locale.default.json"), r#"{"hello":"Hello"}"#).unwrap();
        fs::write(dir.path().join("locale.ja.json"), r#"{"hello":"Konnichiwa"}"#).unwrap();

        let theme = Theme::load(dir.path());
        assert_eq!(theme.config["accent"], "red");
        assert_eq!(theme.locale["hello"], "Hello");
        assert_eq!(theme.locale["ja"]["hello"], "Konnichiwa");
    }

    #[test]
    fn test_bad_json_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.broken.json"), "{nope").unwrap();

        let theme = Theme::load(dir.path());
        assert_eq!(theme.config, serde_json::json!({}));
    }
}

//! Raw, file-facing application settings.
//!
//! `AppSettings` mirrors what a project may write in `tatami.toml`; every
//! field is optional and defaults are applied during resolution. Loading
//! goes through figment so `TATAMI_*` environment variables can override
//! individual keys.

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Conventional config file name at the project root.
pub const CONFIG_FILE: &str = "tatami.toml";

/// Unresolved project settings as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppSettings {
    pub source_directory: Option<String>,
    pub routes_directory: Option<String>,
    pub layouts_directory: Option<String>,
    pub sections_directory: Option<String>,
    pub partials_directory: Option<String>,
    pub theme_directory: Option<String>,

    pub entry_client_file: Option<String>,
    pub entry_server_file: Option<String>,

    pub server_build_directory: Option<String>,
    pub client_build_directory: Option<String>,

    /// Logical client entry names mapped to source files. Defaults to a
    /// single `entry-client` entry.
    pub client_entries: Option<BTreeMap<String, String>>,

    /// Extra directories the watcher should observe.
    pub custom_watch_directories: Option<Vec<String>>,

    /// Markdown content map settings (`[markdown]` table).
    pub markdown: Option<MarkdownSettings>,
}

/// Raw `[markdown]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MarkdownSettings {
    pub enable: bool,
    pub contents_directory: Option<String>,
}

impl AppSettings {
    /// Load settings for a project root.
    ///
    /// A missing config file yields all-default settings; an unreadable or
    /// syntactically invalid file is a fatal [`ConfigError`].
    pub fn load(root: &Path) -> Result<Self> {
        let file = root.join(CONFIG_FILE);
        let figment = Figment::new()
            .merge(Toml::file(&file))
            .merge(Env::prefixed("TATAMI_").split("__"));

        figment.extract().map_err(|err| ConfigError::Unreadable {
            path: file,
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = AppSettings::load(dir.path()).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_toml_fields_parsed() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "source-directory = \"app\"\nroutes-directory = \"pages\"\n",
        )
        .unwrap();

        let settings = AppSettings::load(dir.path()).unwrap();
        assert_eq!(settings.source_directory.as_deref(), Some("app"));
        assert_eq!(settings.routes_directory.as_deref(), Some("pages"));
    }

    #[test]
    fn test_markdown_table_parsed() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[markdown]\nenable = true\ncontents-directory = \"src/docs\"\n",
        )
        .unwrap();

        let settings = AppSettings::load(dir.path()).unwrap();
        let markdown = settings.markdown.unwrap();
        assert!(markdown.enable);
        assert_eq!(markdown.contents_directory.as_deref(), Some("src/docs"));
    }

    #[test]
    fn test_invalid_toml_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "routes-directory = [broken").unwrap();

        let err = AppSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }
}

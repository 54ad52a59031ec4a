//! Configuration resolution for the Tatami framework.
//!
//! This crate turns a project directory into a fully resolved [`TatamiConfig`]:
//! it loads `tatami.toml` (plus `TATAMI_*` environment overrides), resolves the
//! source/build directory layout, probes for the client and server entry files,
//! walks the routes directory into a [`RouteTable`], and collects the
//! template, theme, and markdown content maps the server build embeds.
//!
//! Resolution is fatal-on-error by design: a project that cannot produce a
//! coherent config should never reach the build pipeline.

pub mod config;
pub mod error;
pub mod markdown;
pub mod mode;
pub mod routes;
pub mod settings;
pub mod templates;
pub mod theme;

pub use config::{load_config, RelativePaths, TatamiConfig};
pub use error::{ConfigError, Result};
pub use markdown::{load_markdown_contents, MarkdownConfig, MarkdownContent};
pub use mode::Mode;
pub use routes::{RouteEntry, RouteTable, RouteTableBuilder};
pub use settings::{AppSettings, MarkdownSettings};
pub use templates::TemplateMap;
pub use theme::Theme;

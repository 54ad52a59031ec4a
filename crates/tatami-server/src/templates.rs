//! Template rendering context.
//!
//! Owns a minijinja environment built from the discovered template sources,
//! registered under `layouts/`, `sections/`, `partials/`, and `routes/`
//! prefixes. The environment is an explicit value, not a process global:
//! [`TemplateContext::purge`] rebuilds it from the kept sources and a build
//! swap replaces it wholesale.

use std::fmt;

use indexmap::IndexMap;
use minijinja::Environment;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ServerError};

/// Document used when a requested layout does not exist. Registered under a
/// reserved name so error pages render even in template-less projects.
const FALLBACK_NAME: &str = "__fallback";
const FALLBACK_DOCUMENT: &str = "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{{ title }}</title></head>\n<body>\n{{ raw_html }}\n</body>\n</html>\n";

pub struct TemplateContext {
    sources: IndexMap<String, String>,
    env: Environment<'static>,
}

impl TemplateContext {
    /// Build a context from prefixed name to template source.
    ///
    /// A template that fails to parse is logged and skipped; the rest of the
    /// environment still works.
    pub fn from_sources(sources: IndexMap<String, String>) -> Self {
        let env = build_environment(&sources);
        Self { sources, env }
    }

    pub fn empty() -> Self {
        Self::from_sources(IndexMap::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Register or replace one template.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
        self.env = build_environment(&self.sources);
    }

    /// Drop and rebuild the environment from the kept sources.
    pub fn purge(&mut self) {
        self.env = build_environment(&self.sources);
    }

    pub fn render(&self, name: &str, context: &Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|err| ServerError::Template {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        template
            .render(minijinja::Value::from_serialize(context))
            .map_err(|err| ServerError::Template {
                name: name.to_string(),
                reason: err.to_string(),
            })
    }

    /// Render a template, degrading to the built-in fallback document and
    /// finally to an inert comment. Never panics, never errors.
    pub fn render_or_fallback(&self, name: &str, context: &Value) -> String {
        match self.render(name, context) {
            Ok(markup) => markup,
            Err(err) => {
                warn!(template = name, %err, "template unavailable, using fallback");
                self.render(FALLBACK_NAME, context).unwrap_or_else(|err| {
                    format!("<!-- template \"{name}\" failed: {err} -->")
                })
            }
        }
    }
}

/// Template names carry no file extension, so minijinja's extension-based
/// auto-escaping stays off and raw markup blocks pass through unescaped.
fn build_environment(sources: &IndexMap<String, String>) -> Environment<'static> {
    let mut env = Environment::new();
    for (name, source) in sources {
        if let Err(err) = env.add_template_owned(name.clone(), source.clone()) {
            warn!(template = %name, %err, "template failed to parse, skipping");
        }
    }
    if let Err(err) = env.add_template_owned(FALLBACK_NAME.to_string(), FALLBACK_DOCUMENT.to_string()) {
        warn!(%err, "fallback document failed to parse");
    }
    env
}

impl fmt::Debug for TemplateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateContext")
            .field("templates", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> TemplateContext {
        let mut sources = IndexMap::new();
        sources.insert(
            "layouts/default".to_string(),
            "<html><body>{{ content }}</body></html>".to_string(),
        );
        sources.insert(
            "routes/index".to_string(),
            "<h1>{{ title }}</h1>".to_string(),
        );
        TemplateContext::from_sources(sources)
    }

    #[test]
    fn test_render_with_context() {
        let templates = context();
        let markup = templates
            .render("routes/index", &json!({ "title": "Home" }))
            .unwrap();
        assert_eq!(markup, "<h1>Home</h1>");
    }

    #[test]
    fn test_missing_template_is_an_error_not_a_panic() {
        let templates = context();
        let err = templates.render("layouts/nope", &json!({})).unwrap_err();
        assert!(matches!(err, ServerError::Template { ref name, .. } if name == "layouts/nope"));
    }

    #[test]
    fn test_fallback_document_carries_raw_html() {
        let templates = TemplateContext::empty();
        let markup = templates.render_or_fallback(
            "layouts/404",
            &json!({ "title": "404", "raw_html": "<pre><code>Not Found.</code></pre>" }),
        );
        assert!(markup.contains("<pre><code>Not Found.</code></pre>"));
        assert!(markup.starts_with("<!doctype html>"));
    }

    #[test]
    fn test_insert_and_purge_keep_templates_renderable() {
        let mut templates = context();
        templates.insert("partials/nav", "<nav>{{ label }}</nav>");
        assert!(templates.contains("partials/nav"));

        templates.purge();
        let markup = templates
            .render("partials/nav", &json!({ "label": "menu" }))
            .unwrap();
        assert_eq!(markup, "<nav>menu</nav>");
    }

    #[test]
    fn test_bad_template_skipped_without_poisoning_the_rest() {
        let mut sources = IndexMap::new();
        sources.insert("layouts/bad".to_string(), "{% if %}".to_string());
        sources.insert("layouts/good".to_string(), "ok".to_string());
        let templates = TemplateContext::from_sources(sources);

        assert_eq!(templates.render("layouts/good", &json!({})).unwrap(), "ok");
        assert!(templates.render("layouts/bad", &json!({})).is_err());
    }
}

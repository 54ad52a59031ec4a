//! Route modules: the handler surface of a route.

use async_trait::async_trait;
use http::StatusCode;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::request::Request;
use crate::response::{render, Response};
use crate::templates::TemplateContext;

/// Dispatchable handler methods. HEAD is not listed: it runs the GET logic
/// and the dispatcher strips the body afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Map an HTTP method onto a handler slot.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET | http::Method::HEAD => Some(Method::Get),
            http::Method::POST => Some(Method::Post),
            http::Method::PUT => Some(Method::Put),
            http::Method::PATCH => Some(Method::Patch),
            http::Method::DELETE => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }
}

/// Error surfaced to the 500 fallback page.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorState {
    pub message: String,
    /// Only populated in development mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorState {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn from_error(error: &anyhow::Error, dev: bool) -> Self {
        Self {
            message: error.to_string(),
            stack: dev.then(|| format!("{error:?}")),
        }
    }
}

/// Renders route templates on behalf of a handler, with the request's base
/// context merged under any handler-supplied scope.
pub struct ContentRenderer<'a> {
    templates: &'a TemplateContext,
    base: Value,
}

impl<'a> ContentRenderer<'a> {
    pub fn new(templates: &'a TemplateContext, base: Value) -> Self {
        Self { templates, base }
    }

    /// Render `routes/<name>`; a bare name is prefixed automatically.
    pub fn create_content(&self, name: &str, scope: Option<&Value>) -> String {
        let name = if name.starts_with("routes/") {
            name.to_string()
        } else {
            format!("routes/{name}")
        };

        let mut context = self.base.clone();
        if let (Some(target), Some(Value::Object(extra))) = (context.as_object_mut(), scope) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        self.templates.render_or_fallback(&name, &context)
    }
}

/// Everything a handler gets to see for one request.
pub struct HandlerArgs<'a> {
    pub request: &'a Request,
    pub query: IndexMap<String, String>,
    pub params: IndexMap<String, String>,
    /// Theme data plus any server context, as passed to templates.
    pub context: Value,
    pub dev: bool,
    pub content: ContentRenderer<'a>,
}

pub type HandlerResult = anyhow::Result<Response>;

/// One route's handlers.
///
/// `methods` declares which slots are implemented; the dispatcher answers
/// 404 for a matched route whose module does not carry the request's method.
#[async_trait]
pub trait RouteModule: Send + Sync {
    fn methods(&self) -> &[Method];

    async fn handle(&self, method: Method, args: HandlerArgs<'_>) -> HandlerResult;
}

/// Stand-in for routes without a registered handler: answers GET by
/// rendering the route's own template.
pub struct DefaultRouteModule {
    route_id: String,
}

impl DefaultRouteModule {
    pub fn new(route_id: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
        }
    }
}

#[async_trait]
impl RouteModule for DefaultRouteModule {
    fn methods(&self) -> &[Method] {
        &[Method::Get]
    }

    async fn handle(&self, _method: Method, args: HandlerArgs<'_>) -> HandlerResult {
        let markup = args.content.create_content(&self.route_id, None);
        Ok(render(markup, StatusCode::OK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_mapping() {
        assert_eq!(Method::from_http(&http::Method::GET), Some(Method::Get));
        assert_eq!(Method::from_http(&http::Method::HEAD), Some(Method::Get));
        assert_eq!(Method::from_http(&http::Method::DELETE), Some(Method::Delete));
        assert_eq!(Method::from_http(&http::Method::TRACE), None);
    }

    #[test]
    fn test_error_state_stack_only_in_dev() {
        let error = anyhow::anyhow!("boom");
        assert!(ErrorState::from_error(&error, true).stack.is_some());
        assert!(ErrorState::from_error(&error, false).stack.is_none());
    }

    #[test]
    fn test_content_renderer_prefixes_and_merges_scope() {
        let mut sources = indexmap::IndexMap::new();
        sources.insert(
            "routes/hero".to_string(),
            "<h1>{{ title }} ({{ site }})</h1>".to_string(),
        );
        let templates = TemplateContext::from_sources(sources);
        let renderer = ContentRenderer::new(&templates, json!({ "site": "tatami" }));

        let markup = renderer.create_content("hero", Some(&json!({ "title": "Hi" })));
        assert_eq!(markup, "<h1>Hi (tatami)</h1>");

        // An already-prefixed name is used as is.
        let markup = renderer.create_content("routes/hero", Some(&json!({ "title": "Yo" })));
        assert_eq!(markup, "<h1>Yo (tatami)</h1>");
    }
}

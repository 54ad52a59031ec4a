//! The request dispatcher.
//!
//! One fixed state machine per request:
//!
//! 1. unknown method ⇒ 405 plain text, before any matching;
//! 2. HEAD runs the GET logic, then the body is discarded;
//! 3. no route ⇒ 404 page through the `404` layout;
//! 4. matched handler ⇒ its response verbatim;
//! 5. matched route without the method ⇒ 404 page;
//! 6. handler error ⇒ 500 page through the `500` layout;
//!
//! with every fallback page assembled by the server entry.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error};

use tatami_config::Mode;

use crate::build::{EntryContext, ServerBuild, ServerBuildCell};
use crate::module::{ContentRenderer, ErrorState, HandlerArgs, Method};
use crate::request::{is_valid_request_method, Request};
use crate::response::{plain_text, Response, TEXT_HTML};
use crate::router::match_routes;

pub struct RequestHandler {
    cell: Arc<ServerBuildCell>,
    dev: bool,
    /// In production the build is pinned once; in development every request
    /// reads the cell so rebuild swaps take effect immediately.
    pinned: Option<Arc<ServerBuild>>,
}

impl RequestHandler {
    pub fn new(cell: Arc<ServerBuildCell>, mode: Mode) -> Self {
        let dev = mode.is_dev();
        let pinned = (!dev).then(|| cell.load());
        Self { cell, dev, pinned }
    }

    fn current(&self) -> Arc<ServerBuild> {
        match &self.pinned {
            Some(build) => Arc::clone(build),
            None => self.cell.load(),
        }
    }

    pub async fn handle(&self, request: &Request) -> Response {
        if !is_valid_request_method(&request.method) {
            return plain_text("Method not Allowed", StatusCode::METHOD_NOT_ALLOWED);
        }

        let build = self.current();
        let is_head = request.method == http::Method::HEAD;
        let mut response = self.dispatch(&build, request).await;
        if is_head {
            *response.body_mut() = Bytes::new();
        }
        response
    }

    async fn dispatch(&self, build: &ServerBuild, request: &Request) -> Response {
        let target = request.path_and_query();
        let Some(found) = match_routes(build.routes.values(), target) else {
            debug!(%target, "no route matched");
            return self.not_found(build, request);
        };

        // The method was validated up front, so this cannot miss.
        let Some(method) = Method::from_http(&request.method) else {
            return plain_text("Method not Allowed", StatusCode::METHOD_NOT_ALLOWED);
        };

        let module = Arc::clone(&found.route.module);
        if !module.methods().contains(&method) {
            debug!(route = %found.route.id, method = method.as_str(), "no handler for method");
            return self.not_found(build, request);
        }

        let base_context = self.base_context(build);
        let args = HandlerArgs {
            request,
            query: found.query,
            params: found.params,
            context: base_context.clone(),
            dev: self.dev,
            content: ContentRenderer::new(&build.templates, base_context),
        };

        match module.handle(method, args).await {
            Ok(response) => response,
            Err(err) => {
                error!(route = %found.route.id, %err, "handler failed");
                self.server_error(build, request, &err)
            }
        }
    }

    fn base_context(&self, build: &ServerBuild) -> Value {
        json!({
            "theme": serde_json::to_value(&build.theme).unwrap_or(Value::Null),
            "mode": build.config.mode.to_string(),
            "markdown_contents": serde_json::to_value(&build.config.markdown.contents)
                .unwrap_or(Value::Null),
        })
    }

    fn not_found(&self, build: &ServerBuild, request: &Request) -> Response {
        self.fallback(
            build,
            request,
            StatusCode::NOT_FOUND,
            ErrorState::new("Not Found"),
            "<pre><code>Not Found.</code></pre>".to_string(),
        )
    }

    fn server_error(&self, build: &ServerBuild, request: &Request, err: &anyhow::Error) -> Response {
        let error = ErrorState::from_error(err, self.dev);
        let detail = match &error.stack {
            Some(stack) => format!("{}\n{stack}", error.message),
            None => error.message.clone(),
        };
        self.fallback(
            build,
            request,
            StatusCode::INTERNAL_SERVER_ERROR,
            error,
            format!("<pre><code>{detail}</code></pre>"),
        )
    }

    /// Render an error layout and hand the markup to the server entry.
    fn fallback(
        &self,
        build: &ServerBuild,
        request: &Request,
        status: StatusCode,
        error: ErrorState,
        raw_html: String,
    ) -> Response {
        let layout = format!("layouts/{}", status.as_u16());
        let mut context = self.base_context(build);
        if let Some(target) = context.as_object_mut() {
            target.insert(
                "error".to_string(),
                serde_json::to_value(&error).unwrap_or(Value::Null),
            );
            target.insert("raw_html".to_string(), Value::String(raw_html));
            target.insert("title".to_string(), Value::String(status.as_u16().to_string()));
        }
        let markup = build.templates.render_or_fallback(&layout, &context);

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(TEXT_HTML),
        );
        build.entry.render_document(
            request,
            status,
            headers,
            markup,
            EntryContext {
                assets: &build.assets,
                routes: &build.routes,
                error: Some(&error),
            },
        )
    }
}

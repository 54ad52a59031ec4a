//! The server build: the immutable unit the dispatcher serves from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use parking_lot::RwLock;

use tatami_build::AssetManifest;
use tatami_config::{TatamiConfig, Theme};

use crate::module::{ErrorState, RouteModule};
use crate::request::Request;
use crate::response::Response;
use crate::templates::TemplateContext;

/// One route as served: its id, its URL template, and its handlers.
#[derive(Clone)]
pub struct RouteBuild {
    pub id: String,
    pub path: String,
    pub module: Arc<dyn RouteModule>,
}

/// Ordered route table; table order is match priority.
pub type RouteManifest = IndexMap<String, RouteBuild>;

/// What the server entry sees when assembling the final document.
pub struct EntryContext<'a> {
    pub assets: &'a AssetManifest,
    pub routes: &'a RouteManifest,
    pub error: Option<&'a ErrorState>,
}

/// Assembles the final response envelope for every fallback outcome.
pub trait ServerEntry: Send + Sync {
    fn render_document(
        &self,
        request: &Request,
        status: StatusCode,
        headers: HeaderMap,
        markup: String,
        context: EntryContext<'_>,
    ) -> Response;
}

/// Entry used when a project brings no custom one: passes the rendered
/// markup through, injecting the manifest loader script when one exists.
pub struct DefaultServerEntry;

impl ServerEntry for DefaultServerEntry {
    fn render_document(
        &self,
        _request: &Request,
        status: StatusCode,
        headers: HeaderMap,
        markup: String,
        context: EntryContext<'_>,
    ) -> Response {
        let markup = match &context.assets.url {
            Some(url) if markup.contains("</head>") => markup.replacen(
                "</head>",
                &format!("<script src=\"{url}\"></script></head>"),
                1,
            ),
            _ => markup,
        };

        let mut response = Response::new(Bytes::from(markup));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Immutable build snapshot: swapped wholesale, never mutated in place.
pub struct ServerBuild {
    pub entry: Arc<dyn ServerEntry>,
    pub routes: RouteManifest,
    pub assets: AssetManifest,
    pub templates: TemplateContext,
    pub theme: Theme,
    pub config: TatamiConfig,
}

/// Generation-counted pointer to the current [`ServerBuild`].
///
/// The dispatcher reads through it per request in development; the watcher
/// swaps it after each successful reload. The generation lets callers detect
/// that a swap happened without comparing builds.
pub struct ServerBuildCell {
    current: RwLock<Arc<ServerBuild>>,
    generation: AtomicU64,
}

impl ServerBuildCell {
    pub fn new(build: ServerBuild) -> Self {
        Self {
            current: RwLock::new(Arc::new(build)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn load(&self) -> Arc<ServerBuild> {
        Arc::clone(&self.current.read())
    }

    /// Install a new build, returning its generation.
    pub fn swap(&self, build: ServerBuild) -> u64 {
        *self.current.write() = Arc::new(build);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

//! Request routing and dispatch for the Tatami framework.
//!
//! A [`ServerBuild`] is the immutable unit of deployment: the route
//! manifest, the asset manifest, the template context, theme data, and the
//! server entry that assembles final documents. The [`RequestHandler`] walks
//! one fixed state machine per request (method validation, route matching,
//! handler dispatch, error fallbacks) and every fallback outcome funnels
//! through the entry's document assembly.
//!
//! In development, builds are swapped wholesale through the
//! [`ServerBuildCell`] after each successful rebuild; nothing in the runtime
//! caches across a swap.

pub mod build;
pub mod cache;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod module;
pub mod request;
pub mod response;
pub mod router;
pub mod templates;

pub use build::{
    DefaultServerEntry, EntryContext, RouteBuild, RouteManifest, ServerBuild, ServerBuildCell,
    ServerEntry,
};
pub use cache::{
    cache_custom, cache_days, cache_hours, cache_minutes, cache_seconds, cache_weeks,
    generate_cache_control_header, get_cache_control_header, no_store, CacheMode, CacheOptions,
};
pub use dispatch::RequestHandler;
pub use error::{Result, ServerError};
pub use loader::{HandlerRegistry, ServerBuildLoader};
pub use module::{
    ContentRenderer, DefaultRouteModule, ErrorState, HandlerArgs, HandlerResult, Method,
    RouteModule,
};
pub use request::{is_valid_request_method, Request};
pub use response::{json, redirect, render, Response};
pub use router::{match_route, match_routes, RequestMatch};
pub use templates::TemplateContext;

//! HTTP front end shared by `dev` and `serve`.
//!
//! Static client assets are served under the public path, the dispatcher
//! answers everything else, and in development an SSE endpoint streams
//! reload events to the browser.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use tatami_server::RequestHandler;

use crate::dev::reload::ReloadBroadcaster;
use crate::error::{CliError, Result};

/// SSE endpoint the reload client subscribes to.
pub const EVENTS_PATH: &str = "/__tatami_events__";

/// Largest request body the dispatcher will buffer.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RequestHandler>,
    pub broadcaster: Option<Arc<ReloadBroadcaster>>,
    pub assets_dir: PathBuf,
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();
    if state.broadcaster.is_some() {
        router = router.route(EVENTS_PATH, get(handle_events));
    }
    router
        .route("/assets/{*path}", get(handle_asset))
        .fallback(handle_request)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(router: Router, port: u16) -> Result<()> {
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| CliError::Bind {
            addr: addr.clone(),
            reason: err.to_string(),
        })?;
    info!("listening on http://{addr}");
    axum::serve(listener, router)
        .await
        .map_err(CliError::Io)?;
    Ok(())
}

async fn handle_events(
    State(state): State<AppState>,
) -> std::result::Result<
    Sse<impl tokio_stream::Stream<Item = std::result::Result<Event, std::convert::Infallible>>>,
    StatusCode,
> {
    let broadcaster = state.broadcaster.ok_or(StatusCode::NOT_FOUND)?;
    let (_id, rx) = broadcaster.register();

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}

async fn handle_asset(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> Response {
    let Some(file) = resolve_asset(&state.assets_dir, &path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&file).await {
        Ok(contents) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type_for(&path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            contents,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Join a URL path under the assets directory, rejecting traversal.
fn resolve_asset(assets_dir: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(assets_dir.join(relative))
}

fn content_type_for(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("json") | Some("map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("woff2") => "font/woff2",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Everything that is not an asset goes through the dispatcher.
async fn handle_request(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .unwrap_or_default();

    let request = tatami_server::Request {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body: bytes,
    };
    let response = state.handler.handle(&request).await;

    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::from(body))
}

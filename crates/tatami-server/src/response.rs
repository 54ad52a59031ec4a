//! Response constructors and content-type plumbing.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use tracing::warn;

pub type Response = http::Response<Bytes>;

pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

const REDIRECT_CODES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

fn with_content_type(body: Bytes, status: StatusCode, content_type: &'static str) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// JSON-serialize `data` into a response body.
pub fn json<T: Serialize>(data: &T, status: StatusCode) -> serde_json::Result<Response> {
    let body = serde_json::to_vec(data)?;
    Ok(with_content_type(body.into(), status, APPLICATION_JSON))
}

/// Redirect to `url`. A status outside the redirect set falls back to 302.
pub fn redirect(url: &str, status: Option<StatusCode>) -> Response {
    let status = status
        .filter(is_redirect_status)
        .unwrap_or(StatusCode::FOUND);
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    match HeaderValue::from_str(url) {
        Ok(location) => {
            response.headers_mut().insert(LOCATION, location);
        }
        Err(_) => warn!(%url, "redirect target is not a valid header value"),
    }
    response
}

/// Rendered HTML markup.
pub fn render(markup: impl Into<Bytes>, status: StatusCode) -> Response {
    with_content_type(markup.into(), status, TEXT_HTML)
}

/// Plain-text body, used by the 405 short circuit.
pub fn plain_text(body: impl Into<Bytes>, status: StatusCode) -> Response {
    with_content_type(body.into(), status, TEXT_PLAIN)
}

pub fn is_redirect_status(status: &StatusCode) -> bool {
    REDIRECT_CODES.contains(status)
}

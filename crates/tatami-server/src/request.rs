//! The server-side request envelope.
//!
//! A small owned structure rather than a streaming body: handlers here
//! either inspect the request or hand it to templates, and an owned body
//! keeps the envelope cheaply cloneable across dispatch layers.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::with_method(Method::GET, target)
    }

    pub fn with_method(method: Method, target: &str) -> Self {
        let uri = target.parse::<Uri>().unwrap_or_else(|_| Uri::from_static("/"));
        Self::new(method, uri)
    }

    /// Path plus query string, the matcher's input.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

/// Whether the dispatcher understands the method at all. Anything else is
/// rejected with 405 before route matching.
pub fn is_valid_request_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

//! URL-to-route matching.
//!
//! Each route's `:name` template compiles to a case-insensitive anchored
//! regex with one named capture per parameter and an optional trailing
//! slash. A template that fails to compile is logged and treated as
//! never-matching; routing stays alive.

use indexmap::IndexMap;
use regex::Regex;
use tracing::error;
use url::form_urlencoded;

use crate::build::RouteBuild;

/// Outcome of matching one route against one request target.
pub struct RequestMatch<'a> {
    pub route: &'a RouteBuild,
    pub path: &'a str,
    pub matched: bool,
    pub query: IndexMap<String, String>,
    pub params: IndexMap<String, String>,
}

/// Compile a `:name` path template into an anchored matcher.
fn compile_matcher(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("(?i)^");
    for segment in template.split('/').filter(|segment| !segment.is_empty()) {
        pattern.push('/');
        match segment.strip_prefix(':') {
            Some(name) => {
                pattern.push_str("(?P<");
                pattern.push_str(name);
                pattern.push_str(">[^/]+)");
            }
            None => pattern.push_str(&regex::escape(segment)),
        }
    }
    pattern.push_str("/?$");
    Regex::new(&pattern)
}

fn parse_query(query: &str) -> IndexMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Match one route against a path-and-query target.
pub fn match_route<'a>(route: &'a RouteBuild, target: &'a str) -> RequestMatch<'a> {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, IndexMap::new()),
    };

    let matcher = match compile_matcher(&route.path) {
        Ok(matcher) => matcher,
        Err(err) => {
            error!(route = %route.id, template = %route.path, %err, "route template failed to compile");
            return RequestMatch {
                route,
                path: target,
                matched: false,
                query,
                params: IndexMap::new(),
            };
        }
    };

    let Some(captures) = matcher.captures(path) else {
        return RequestMatch {
            route,
            path: target,
            matched: false,
            query,
            params: IndexMap::new(),
        };
    };

    let params = matcher
        .capture_names()
        .flatten()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|value| (name.to_string(), value.as_str().to_string()))
        })
        .collect();

    RequestMatch {
        route,
        path: target,
        matched: true,
        query,
        params,
    }
}

/// First match in table order wins.
pub fn match_routes<'a>(
    routes: impl IntoIterator<Item = &'a RouteBuild>,
    target: &'a str,
) -> Option<RequestMatch<'a>> {
    routes
        .into_iter()
        .map(|route| match_route(route, target))
        .find(|result| result.matched)
}

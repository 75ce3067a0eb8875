//! Request path matching.
//!
//! # Responsibilities
//! - Normalize the raw request target (query override, query strip, proxy prefix)
//! - Exact lookup first, then parameterized patterns in registration order
//! - Memoize the outcome per normalized path
//!
//! # Design Decisions
//! - First registered parameterized pattern wins; there is no specificity
//!   ranking, so adding a route never changes how earlier routes match
//! - The memo is never invalidated: the route table is frozen after boot
//! - Live-debug mode skips the memo entirely

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::Uri;
use dashmap::DashMap;

use crate::config::schema::RoutingConfig;
use crate::observability::metrics;
use crate::routing::table::{Route, RouteTable};

/// Outcome of matching a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Exact route path.
    Exact(String),
    /// Parameterized route pattern with captures by name.
    Param {
        pattern: String,
        captures: HashMap<String, String>,
    },
    None,
}

impl MatchResult {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchResult::Exact(_) => "exact",
            MatchResult::Param { .. } => "param",
            MatchResult::None => "none",
        }
    }

    /// The route key to look up in the table.
    pub fn route_path(&self) -> Option<&str> {
        match self {
            MatchResult::Exact(path) => Some(path),
            MatchResult::Param { pattern, .. } => Some(pattern),
            MatchResult::None => None,
        }
    }
}

pub struct Matcher {
    table: Arc<RouteTable>,
    memo: DashMap<String, MatchResult>,
    path_prefix: String,
    query_path_param: Option<String>,
    live: bool,
}

impl Matcher {
    pub fn new(table: Arc<RouteTable>, routing: &RoutingConfig, live: bool) -> Self {
        Self {
            table,
            memo: DashMap::new(),
            path_prefix: routing.path_prefix.trim_end_matches('/').to_string(),
            query_path_param: routing.query_path_param.clone().filter(|p| !p.is_empty()),
            live,
        }
    }

    /// Normalize a raw request target (`path?query`) to a route path.
    pub fn normalize(&self, target: &str) -> String {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let overridden = self
            .query_path_param
            .as_deref()
            .zip(query)
            .and_then(|(param, query)| query_value(query, param))
            .filter(|v| !v.is_empty());

        let mut path = overridden.unwrap_or_else(|| path.to_string());
        if let Some(i) = path.find('?') {
            path.truncate(i);
        }

        if !self.path_prefix.is_empty() {
            if let Some(rest) = path.strip_prefix(&self.path_prefix) {
                if rest.is_empty() || rest.starts_with('/') {
                    path = rest.to_string();
                }
            }
        }

        if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        }
    }

    /// Match a normalized path.
    pub fn match_path(&self, path: &str) -> MatchResult {
        if !self.live {
            if let Some(hit) = self.memo.get(path) {
                metrics::record_match(hit.kind(), true);
                return hit.clone();
            }
        }

        let result = self.compute(path);
        metrics::record_match(result.kind(), false);
        if !self.live {
            self.memo.insert(path.to_string(), result.clone());
        }
        result
    }

    fn compute(&self, path: &str) -> MatchResult {
        if self.table.get(path).is_some() {
            return MatchResult::Exact(path.to_string());
        }

        for route in self.table.parameterized() {
            if let Some(captures) = route.pattern.captures(path) {
                return MatchResult::Param {
                    pattern: route.path().to_string(),
                    captures,
                };
            }
        }
        MatchResult::None
    }

    /// The route behind a match result.
    pub fn route(&self, result: &MatchResult) -> Option<&Route> {
        result.route_path().and_then(|p| self.table.get(p))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn clear(&self) {
        self.memo.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.memo.len()
    }
}

/// Decoded value of `name` in a query string.
fn query_value(query: &str, name: &str) -> Option<String> {
    let uri: Uri = format!("/?{}", query).parse().ok()?;
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(&uri).ok()?;
    params.remove(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{Handler, HandlerKey};
    use crate::http::request::RequestContext;
    use crate::http::response::ApiResponse;
    use axum::response::IntoResponse;
    use crate::routing::resolver::MetaSource;
    use crate::routing::table::RouteKind;

    fn handler(key: &str) -> Handler {
        Handler::new(HandlerKey::new(key), |_ctx: RequestContext| async move {
            Ok(ApiResponse::ok(serde_json::Value::Null).into_response())
        })
    }

    fn matcher(paths: &[&str], live: bool) -> Matcher {
        let mut table = RouteTable::new();
        for (i, path) in paths.iter().enumerate() {
            table
                .register(path, handler(&format!("h{}", i)), MetaSource::Default, RouteKind::Api)
                .unwrap();
        }
        Matcher::new(Arc::new(table), &RoutingConfig::default(), live)
    }

    #[test]
    fn exact_wins_over_earlier_parameterized() {
        let m = matcher(&["/post/{id}", "/post/list"], false);
        assert_eq!(m.match_path("/post/list"), MatchResult::Exact("/post/list".into()));

        match m.match_path("/post/42") {
            MatchResult::Param { pattern, captures } => {
                assert_eq!(pattern, "/post/{id}");
                assert_eq!(captures["id"], "42");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn first_registered_pattern_wins() {
        let m = matcher(&["/{section}/{id}", "/post/{id}"], false);
        match m.match_path("/post/7") {
            MatchResult::Param { pattern, .. } => assert_eq!(pattern, "/{section}/{id}"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn misses_are_memoized() {
        let m = matcher(&["/a"], false);
        assert_eq!(m.match_path("/nope"), MatchResult::None);
        assert_eq!(m.cached_len(), 1);
        assert_eq!(m.match_path("/nope"), MatchResult::None);
        assert_eq!(m.cached_len(), 1);
        m.clear();
        assert_eq!(m.cached_len(), 0);
    }

    #[test]
    fn live_mode_skips_memo() {
        let m = matcher(&["/a"], true);
        m.match_path("/a");
        m.match_path("/b");
        assert_eq!(m.cached_len(), 0);
    }

    #[test]
    fn normalization() {
        let m = matcher(&[], false);
        assert_eq!(m.normalize("/post/1?x=1"), "/post/1");
        assert_eq!(m.normalize("/apiService/user/info"), "/user/info");
        assert_eq!(m.normalize("/apiService"), "/");
        assert_eq!(m.normalize("/apiServiceX/a"), "/apiServiceX/a");
        assert_eq!(m.normalize("/index.php?s=/post/9&page=2"), "/post/9");
        assert_eq!(m.normalize("/?s=%2Fuser%2Finfo"), "/user/info");
        assert_eq!(m.normalize("/?s=user"), "/user");
        assert_eq!(m.normalize("/a?s="), "/a");
        assert_eq!(m.normalize("/?page=2&s=%2Fpost%2F5+x"), "/post/5 x");
        assert_eq!(m.normalize(""), "/");
    }

    #[test]
    fn route_lookup_from_result() {
        let m = matcher(&["/post/{id}"], false);
        let result = m.match_path("/post/1");
        assert_eq!(m.route(&result).unwrap().handler.key().as_str(), "h0");
        assert!(m.route(&MatchResult::None).is_none());
    }
}

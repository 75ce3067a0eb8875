//! Response cache headers.
//!
//! # Responsibilities
//! - Compute the effective `(enabled, ttl)` of a route
//! - Force caching off for authenticated, mutating or excluded requests
//! - Render `Cache-Control` / `Expires` / `Pragma`

use std::time::{Duration, SystemTime};

use axum::http::{header, HeaderMap, HeaderValue, Method};

use crate::config::CacheConfig;
use crate::delivery::validators::http_date;
use crate::routing::meta::{CacheDirective, RouteMeta};

pub struct CacheRules {
    defaults: CacheDirective,
    exclude: Vec<String>,
}

impl CacheRules {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            defaults: CacheDirective {
                enabled: config.enabled,
                time: config.time,
            },
            exclude: config.exclude.clone(),
        }
    }

    /// Effective cache directive for a request on a route.
    pub fn effective(&self, meta: &RouteMeta, method: &Method, path: &str) -> CacheDirective {
        let declared = meta.cache.unwrap_or(self.defaults);

        let route_accepts_post = meta
            .method
            .as_ref()
            .is_some_and(|m| m.iter().any(|m| m == "POST"));
        let forced_off = meta.require_login.is_on()
            || *method == Method::POST
            || route_accepts_post
            || self.exclude.iter().any(|p| path.starts_with(p.as_str()));

        if forced_off {
            CacheDirective { enabled: false, time: 0 }
        } else {
            declared
        }
    }
}

/// Cache headers for a directive.
pub fn cache_headers(directive: CacheDirective) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if directive.enabled && directive.time > 0 {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", directive.time)) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        let expires = SystemTime::now() + Duration::from_secs(directive.time);
        if let Ok(value) = HeaderValue::from_str(&http_date(expires)) {
            headers.insert(header::EXPIRES, value);
        }
    } else {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::meta::Gate;

    fn rules() -> CacheRules {
        CacheRules::new(&CacheConfig {
            enabled: true,
            time: 60,
            ..CacheConfig::default()
        })
    }

    fn cached(time: u64) -> RouteMeta {
        RouteMeta {
            cache: Some(CacheDirective { enabled: true, time }),
            ..RouteMeta::default()
        }
    }

    #[test]
    fn unset_route_cache_uses_global_defaults() {
        let directive = rules().effective(&RouteMeta::default(), &Method::GET, "/post/1");
        assert_eq!(directive, CacheDirective { enabled: true, time: 60 });
    }

    #[test]
    fn route_cache_overrides_defaults() {
        let directive = rules().effective(&cached(300), &Method::GET, "/post/1");
        assert_eq!(directive.time, 300);
    }

    #[test]
    fn require_login_forces_no_cache() {
        let meta = RouteMeta { require_login: Gate::On, ..cached(300) };
        let directive = rules().effective(&meta, &Method::GET, "/me");
        assert!(!directive.enabled);

        let headers = cache_headers(directive);
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
    }

    #[test]
    fn post_and_excluded_prefixes_force_no_cache() {
        let rules = rules();
        assert!(!rules.effective(&cached(300), &Method::POST, "/post/1").enabled);
        assert!(!rules.effective(&cached(300), &Method::GET, "/auth/login").enabled);
        assert!(!rules.effective(&cached(300), &Method::GET, "/anon/install/step").enabled);

        let post_route = RouteMeta { method: Some(vec!["GET".into(), "POST".into()]), ..cached(300) };
        assert!(!rules.effective(&post_route, &Method::GET, "/form").enabled);
    }

    #[test]
    fn enabled_directive_headers() {
        let headers = cache_headers(CacheDirective { enabled: true, time: 120 });
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=120");
        assert!(headers[header::EXPIRES].to_str().unwrap().ends_with("GMT"));
        assert!(headers.get(header::PRAGMA).is_none());
    }
}

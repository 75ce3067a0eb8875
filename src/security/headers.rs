//! Response header policy: CORS and content type.
//!
//! # Responsibilities
//! - Build the CORS header set for a request (also used for preflight)
//! - Content type for API responses
//!
//! # Design Decisions
//! - With no configured allow-list the request `Origin` is echoed, else the
//!   request's own scheme and host, else `*`
//! - With an allow-list, unknown origins get no `Access-Control-Allow-Origin`
//! - Credentials are allowed only alongside a concrete origin

use axum::http::{header, HeaderMap, HeaderValue};

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, PATCH";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, X-API-Token";
pub const MAX_AGE_SECS: u32 = 3600;

/// CORS headers for a request.
pub fn cors_headers(request: &HeaderMap, allowed_origins: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(origin) = allow_origin(request, allowed_origins) {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            // Browsers refuse credentials with a wildcard origin.
            if origin != "*" {
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
                headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            }
        }
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, MAX_AGE_SECS.into());
    headers
}

fn allow_origin(request: &HeaderMap, allowed: &[String]) -> Option<String> {
    let origin = request
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| !o.is_empty());

    match origin {
        Some(origin) if allowed.is_empty() || allowed.iter().any(|a| a == origin) => Some(origin.to_string()),
        Some(_) => None,
        None if !allowed.is_empty() => allowed.first().cloned(),
        None => {
            let host = request.get(header::HOST).and_then(|v| v.to_str().ok());
            let scheme = request
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("http");
            Some(match host {
                Some(host) => format!("{}://{}", scheme, host),
                None => "*".to_string(),
            })
        }
    }
}

/// Content type of JSON API responses.
pub fn json_content_type() -> HeaderValue {
    HeaderValue::from_static("application/json; charset=utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, v.parse().unwrap());
        }
        headers
    }

    #[test]
    fn echoes_origin_without_allow_list() {
        let headers = cors_headers(&request(&[("origin", "https://app.example")]), &[]);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    }

    #[test]
    fn falls_back_to_host_then_wildcard() {
        let headers = cors_headers(&request(&[("host", "cms.local:8080")]), &[]);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://cms.local:8080");

        let headers = cors_headers(&HeaderMap::new(), &[]);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert!(headers.get(header::VARY).is_none());
    }

    #[test]
    fn allow_list_rejects_unknown_origins() {
        let allowed = vec!["https://good.example".to_string()];
        let headers = cors_headers(&request(&[("origin", "https://evil.example")]), &allowed);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

        let headers = cors_headers(&request(&[("origin", "https://good.example")]), &allowed);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://good.example");
    }
}

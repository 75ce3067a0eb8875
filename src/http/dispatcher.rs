//! Handler invocation inside a failure boundary.
//!
//! # Responsibilities
//! - Inject path captures into the request parameters
//! - Run the middleware chain and the handler
//! - Turn handler errors and panics into error responses
//! - Merge the policy status and headers into the final response
//!
//! # Design Decisions
//! - Framework errors (`HttpError`) keep their status and data; panics become 500
//! - Content routes render the theme error page, everything else the JSON envelope
//! - The handler's `Response` is terminal; only headers it did not set are added

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use futures_util::FutureExt;

use crate::http::context::AppContext;
use crate::http::error::HttpError;
use crate::http::middleware::{MiddlewareRegistry, Next};
use crate::http::request::RequestContext;
use crate::routing::meta::RouteMeta;
use crate::routing::table::{Route, RouteKind};
use crate::security::policy::PolicyHeaders;

pub struct Dispatcher {
    middleware: MiddlewareRegistry,
    global: Vec<String>,
}

impl Dispatcher {
    pub fn new(middleware: MiddlewareRegistry, global: Vec<String>) -> Self {
        Self { middleware, global }
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    pub async fn dispatch(
        &self,
        route: &Route,
        meta: &RouteMeta,
        captures: HashMap<String, String>,
        mut ctx: RequestContext,
        policy: PolicyHeaders,
    ) -> Response {
        ctx.params.extend(captures);
        let app = ctx.app.clone();
        let request_id = ctx.request_id.clone();

        let result = match self.middleware.resolve(self.global.iter().chain(meta.middleware.iter())) {
            Ok(chain) => {
                let next = Next::new(chain, route.handler.clone());
                AssertUnwindSafe(async move { next.run(ctx).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(
                            request_id = %request_id,
                            route = %route.path(),
                            panic = %message,
                            "Handler panicked"
                        );
                        Err(HttpError::Internal(message))
                    })
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(mut response) => {
                if let Some(status) = policy.status {
                    if response.status() == StatusCode::OK {
                        *response.status_mut() = status;
                    }
                }
                merge_headers(&mut response, &policy.headers, true);
                response
            }
            Err(error) => {
                let status = error.status();
                if status.is_server_error() {
                    tracing::error!(
                        request_id = %request_id,
                        route = %route.path(),
                        status = status.as_u16(),
                        error = %error,
                        "Handler failed"
                    );
                } else {
                    tracing::debug!(
                        request_id = %request_id,
                        route = %route.path(),
                        status = status.as_u16(),
                        "Handler returned error"
                    );
                }
                let mut response = render_error(&app, route.kind, &error);
                merge_headers(&mut response, &policy.headers, false);
                response
            }
        }
    }
}

/// Error response for a route kind.
pub fn render_error(app: &AppContext, kind: RouteKind, error: &HttpError) -> Response {
    let verbose = app.verbose_errors();
    if kind.is_content() {
        let mut response = app.theme.render_error(error.status(), &error.public_message(verbose));
        error.decorate(&mut response);
        response
    } else {
        error.to_response(verbose)
    }
}

/// Copy headers the response does not carry yet. Cache headers are skipped
/// for error responses and for responses that set their own `Cache-Control`.
pub fn merge_headers(response: &mut Response, headers: &HeaderMap, include_cache: bool) {
    let include_cache = include_cache && !response.headers().contains_key(header::CACHE_CONTROL);
    for (name, value) in headers {
        let is_cache = *name == header::CACHE_CONTROL || *name == header::EXPIRES || *name == header::PRAGMA;
        if is_cache && !include_cache {
            continue;
        }
        if !response.headers().contains_key(name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    #[test]
    fn merge_keeps_handler_headers() {
        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        let mut policy = HeaderMap::new();
        policy.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        policy.insert(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=60"));

        merge_headers(&mut response, &policy, true);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=60");
    }

    #[test]
    fn merge_skips_cache_headers_on_errors() {
        let mut response = Response::new(Body::empty());
        let mut policy = HeaderMap::new();
        policy.insert(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=60"));
        policy.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        merge_headers(&mut response, &policy, false);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }
}

//! Request context handed to handlers.
//!
//! # Responsibilities
//! - Buffer the request body and parse the query string once
//! - Carry the request ID, client address, path captures and resolved user
//! - Give handlers access to the engine through `Arc<AppContext>`
//!
//! # Design Decisions
//! - Request ID is assigned by the `SetRequestIdLayer` before the engine runs;
//!   `ensure_request_id` covers routers built without that layer
//! - The context is owned by the handler; nothing is shared across requests

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Query};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use uuid::Uuid;

use crate::http::context::AppContext;
use crate::http::error::HttpError;
use crate::services::auth::Claims;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request's ID, generating and inserting a UUID v4 when it has none.
pub fn ensure_request_id(headers: &mut HeaderMap) -> String {
    if let Some(id) = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        return id.to_string();
    }
    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(X_REQUEST_ID, value);
    }
    id
}

/// Everything a handler knows about the current request.
#[derive(Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    /// Normalized route path.
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
    pub request_id: String,
    /// Path captures of a parameterized route.
    pub params: HashMap<String, String>,
    /// Authenticated user (session, or a verified token).
    pub user: Option<Claims>,
    pub app: Arc<AppContext>,
}

impl RequestContext {
    /// Build the context from an incoming request, buffering its body.
    pub async fn from_request(
        app: Arc<AppContext>,
        request: Request<Body>,
        path: String,
    ) -> Result<Self, HttpError> {
        let (parts, body) = request.into_parts();

        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let limit = app.config.security.max_body_size;
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| HttpError::BadRequest(format!("Unreadable request body: {}", e)))?;

        let user = app.auth.session_user(&parts.headers);

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            path,
            query,
            headers: parts.headers,
            body,
            client_addr,
            request_id,
            params: HashMap::new(),
            user,
            app,
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// API token from `Authorization: Bearer`, `X-API-Token` or `?token=`.
    pub fn token(&self) -> Option<String> {
        self.header(header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| self.header("x-api-token"))
            .or_else(|| self.query_param("token"))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| self.app.auth.is_admin(u.user_id))
    }

    /// Client IP, preferring forwarding headers set by a fronting proxy.
    pub fn client_ip(&self) -> String {
        self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| self.header("x-real-ip"))
            .map(str::to_string)
            .or_else(|| self.client_addr.map(|a| a.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Key identifying the caller for rate limiting.
    pub fn client_key(&self) -> String {
        match &self.user {
            Some(user) => format!("user:{}", user.user_id),
            None => format!("ip:{}", self.client_ip()),
        }
    }

    pub fn accepts_gzip(&self) -> bool {
        crate::delivery::compression::accepts_gzip(&self.headers)
    }
}

//! Per-route policy enforcement.
//!
//! # Data Flow
//! ```text
//! RouteMeta + RequestContext
//!     1. header   → status code, CORS, content type
//!     2. token    → route/global token requirement (auth collaborator)
//!     3. login    → 401 unless a user is established
//!     4. admin    → 403 unless the user is an admin
//!     5. method   → 405 with {allowed, received}
//!     6. cache    → Cache-Control / Expires / Pragma
//!     → Continue(headers) | ShortCircuit(error, headers)
//! ```
//!
//! # Design Decisions
//! - The first failing check ends the request; later checks never run
//! - Headers from step 1 accompany error responses too (CORS on failures)
//! - A verified token establishes the user for the rest of the request, even
//!   on routes that do not require one

use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};

use crate::config::schema::{AppConfig, TokenConfig};
use crate::http::error::HttpError;
use crate::http::request::RequestContext;
use crate::routing::meta::RouteMeta;
use crate::security::cache_control::{cache_headers, CacheRules};
use crate::security::headers::{cors_headers, json_content_type};
use crate::services::auth::Authenticator;

/// Status and headers the policy contributes to the final response.
#[derive(Debug, Default, Clone)]
pub struct PolicyHeaders {
    /// Status to use when the handler answers a plain 200.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
}

#[derive(Debug)]
pub enum PolicyOutcome {
    Continue(PolicyHeaders),
    ShortCircuit { error: HttpError, headers: PolicyHeaders },
}

pub struct PolicyEnforcer {
    auth: Arc<dyn Authenticator>,
    token: TokenConfig,
    path_prefix: String,
    cors_origins: Vec<String>,
    debug_api_prefix: String,
    cache: CacheRules,
}

impl PolicyEnforcer {
    pub fn new(config: &AppConfig, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            auth,
            token: config.token.clone(),
            path_prefix: config.routing.path_prefix.trim_end_matches('/').to_string(),
            cors_origins: config.security.cors_origins.clone(),
            debug_api_prefix: config.security.debug_api_prefix.clone(),
            cache: CacheRules::new(&config.cache),
        }
    }

    pub fn enforce(&self, meta: &RouteMeta, ctx: &mut RequestContext) -> PolicyOutcome {
        let mut out = PolicyHeaders::default();

        if meta.header {
            if let Ok(status) = StatusCode::from_u16(meta.code) {
                out.status = Some(status);
            }
            if meta.cors {
                out.headers.extend(self.cors(&ctx.headers));
            }
            if meta.response {
                out.headers.insert(header::CONTENT_TYPE, json_content_type());
            }
        }

        if let Err(error) = self.check_access(meta, ctx) {
            tracing::debug!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                status = error.status().as_u16(),
                "Policy check failed"
            );
            return PolicyOutcome::ShortCircuit { error, headers: out };
        }

        let directive = self.cache.effective(meta, &ctx.method, &ctx.path);
        out.headers.extend(cache_headers(directive));

        PolicyOutcome::Continue(out)
    }

    /// Steps 2 to 5.
    fn check_access(&self, meta: &RouteMeta, ctx: &mut RequestContext) -> Result<(), HttpError> {
        if self.token_required(meta, &ctx.path) {
            self.check_token(ctx)?;
        } else if ctx.user.is_none() {
            // An optional token still identifies the caller; a bad one is ignored.
            if let Some(claims) = ctx.token().and_then(|t| self.auth.verify_token(&t)) {
                ctx.user = Some(claims);
            }
        }

        if meta.require_login.is_on() && ctx.user.is_none() {
            return Err(HttpError::Unauthorized(
                meta.require_login.message_or("Login required").to_string(),
            ));
        }

        if meta.require_admin.is_on() {
            let is_admin = ctx.user.as_ref().is_some_and(|u| self.auth.is_admin(u.user_id));
            if !is_admin {
                return Err(HttpError::Forbidden(
                    meta.require_admin.message_or("Admin privilege required").to_string(),
                ));
            }
        }

        if !meta.allows_method(ctx.method.as_str()) {
            return Err(HttpError::MethodNotAllowed {
                allowed: meta.method.clone().unwrap_or_default(),
                received: ctx.method.as_str().to_string(),
            });
        }

        Ok(())
    }

    fn token_required(&self, meta: &RouteMeta, path: &str) -> bool {
        match meta.token {
            Some(explicit) => explicit,
            None => self.token.enabled && !self.is_whitelisted(path),
        }
    }

    fn is_whitelisted(&self, path: &str) -> bool {
        let prefixed = format!("{}{}", self.path_prefix, path);
        self.token
            .whitelist
            .iter()
            .any(|w| w == path || (!self.path_prefix.is_empty() && *w == prefixed))
    }

    fn check_token(&self, ctx: &mut RequestContext) -> Result<(), HttpError> {
        match ctx.token() {
            None => {
                if ctx.user.is_some() && self.is_debug_api(&ctx.path) {
                    return Ok(());
                }
                Err(HttpError::Forbidden("API token is missing".to_string()))
            }
            Some(token) => match self.auth.verify_token(&token) {
                Some(claims) => {
                    ctx.user = Some(claims);
                    Ok(())
                }
                None => Err(HttpError::Forbidden("API token is invalid".to_string())),
            },
        }
    }

    /// An empty prefix disables the debug allowance.
    fn is_debug_api(&self, path: &str) -> bool {
        !self.debug_api_prefix.is_empty() && path.starts_with(&self.debug_api_prefix)
    }

    /// CORS headers for a request (also used for preflight).
    pub fn cors(&self, request: &HeaderMap) -> HeaderMap {
        cors_headers(request, &self.cors_origins)
    }
}

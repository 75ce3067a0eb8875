//! Route registry.
//!
//! # Responsibilities
//! - Store routes keyed by normalized path, in registration order
//! - Detect conflicting registrations at boot
//! - Expose exact lookup and the ordered list of parameterized routes
//!
//! # Design Decisions
//! - Built mutably during startup, then frozen behind `Arc` (read-only at runtime)
//! - Re-registering the same handler is a no-op; a different handler is a
//!   hard error naming both registration sites
//! - No I/O

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

use serde::Serialize;

use crate::http::handler::Handler;
use crate::routing::pattern::{normalize_path, RoutePattern};
use crate::routing::resolver::MetaSource;

/// Errors raised while building the route table.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(
        "route conflict on '{path}': already registered by {existing_handler} at {existing_site}, \
         rejected {new_handler} at {new_site}"
    )]
    Conflict {
        path: String,
        existing_handler: String,
        existing_site: String,
        new_handler: String,
        new_site: String,
    },

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// What a route serves. Selects the error rendering (JSON or HTML).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Api,
    View,
    Theme,
    Asset,
    Attachment,
    System,
}

impl RouteKind {
    /// Content routes answer errors with an HTML page.
    pub fn is_content(self) -> bool {
        matches!(self, RouteKind::View | RouteKind::Theme)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Api => "api",
            RouteKind::View => "view",
            RouteKind::Theme => "theme",
            RouteKind::Asset => "asset",
            RouteKind::Attachment => "attachment",
            RouteKind::System => "system",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pub pattern: RoutePattern,
    pub handler: Handler,
    pub meta: MetaSource,
    pub kind: RouteKind,
    /// Registration site (`file:line` or a descriptive identifier).
    pub site: String,
}

impl Route {
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path())
            .field("handler", &self.handler.key())
            .field("kind", &self.kind)
            .field("site", &self.site)
            .finish()
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Added,
    /// Same handler registered again at the same path.
    Unchanged,
}

/// In-memory route registry.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route, recording the caller's source location as its site.
    #[track_caller]
    pub fn register(
        &mut self,
        path: &str,
        handler: Handler,
        meta: MetaSource,
        kind: RouteKind,
    ) -> Result<Registered, RegistrationError> {
        let caller = Location::caller();
        let site = format!("{}:{}", caller.file(), caller.line());
        self.register_at(path, handler, meta, kind, site)
    }

    /// Register a route with an explicit site description.
    pub fn register_at(
        &mut self,
        path: &str,
        handler: Handler,
        meta: MetaSource,
        kind: RouteKind,
        site: impl Into<String>,
    ) -> Result<Registered, RegistrationError> {
        let path = normalize_path(path);
        let site = site.into();

        if let Some(&i) = self.index.get(&path) {
            let existing = &self.routes[i];
            if existing.handler.same_as(&handler) {
                tracing::debug!(path = %path, handler = %handler.key(), "Route re-registered with same handler");
                return Ok(Registered::Unchanged);
            }
            let err = RegistrationError::Conflict {
                path,
                existing_handler: existing.handler.key().to_string(),
                existing_site: existing.site.clone(),
                new_handler: handler.key().to_string(),
                new_site: site,
            };
            tracing::error!(error = %err, "Route conflict");
            return Err(err);
        }

        let pattern = RoutePattern::parse(&path)?;
        tracing::debug!(path = %path, handler = %handler.key(), kind = %kind, "Route registered");
        self.index.insert(path, self.routes.len());
        self.routes.push(Route { pattern, handler, meta, kind, site });
        Ok(Registered::Added)
    }

    /// Exact lookup by normalized path.
    pub fn get(&self, path: &str) -> Option<&Route> {
        self.index.get(path).map(|&i| &self.routes[i])
    }

    /// All routes in registration order.
    pub fn list(&self) -> &[Route] {
        &self.routes
    }

    /// Parameterized routes in registration order.
    pub fn parameterized(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.pattern.is_parameterized())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

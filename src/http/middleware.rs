//! Route middleware pipeline.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → global middleware (config order)
//!     → route middleware (RouteMeta.middleware order)
//!     → handler
//! ```
//!
//! Each middleware receives the context and a `Next`; calling `next.run(ctx)`
//! continues the chain, returning early short-circuits it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::schema::MiddlewareConfig;
use crate::http::error::HttpError;
use crate::http::handler::{Handler, HandlerFuture, HandlerResult};
use crate::http::request::RequestContext;
use crate::security::rate_limit::RateLimiter;

/// Middleware names registered by `MiddlewareRegistry::with_builtins`.
pub const BUILTIN_MIDDLEWARE: &[&str] = &["rate_limit"];

pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: RequestContext, next: Next) -> HandlerFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, ctx: RequestContext, next: Next) -> HandlerFuture {
        Box::pin(self(ctx, next))
    }
}

/// Remainder of the pipeline.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    handler: Handler,
}

impl Next {
    pub fn new(chain: Vec<Arc<dyn Middleware>>, handler: Handler) -> Self {
        Self {
            chain: chain.into(),
            index: 0,
            handler,
        }
    }

    pub fn run(mut self, ctx: RequestContext) -> HandlerFuture {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(ctx, self)
            }
            None => self.handler.call(ctx),
        }
    }
}

#[derive(Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in middleware.
    pub fn with_builtins(config: &MiddlewareConfig) -> Self {
        let mut registry = Self::new();
        registry.register("rate_limit", RateLimiter::new(&config.rate_limit));
        registry
    }

    /// Register (or replace) a named middleware.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware) {
        self.entries.insert(name.into(), Arc::new(middleware));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve names in order. An unknown name is a server error.
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<Arc<dyn Middleware>>, HttpError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .map(|name| {
                self.entries.get(name).cloned().ok_or_else(|| {
                    tracing::error!(middleware = %name, "Unknown middleware referenced by route");
                    HttpError::Server(format!("Unknown middleware: {}", name))
                })
            })
            .collect()
    }
}

//! Route handler abstraction.
//!
//! A handler takes the owned `RequestContext` and returns a terminal
//! `Response` or an `HttpError`. Any async closure of that shape is a handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::http::error::HttpError;
use crate::http::request::RequestContext;

pub type HandlerResult = Result<Response, HttpError>;
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin(self(ctx))
    }
}

/// Stable identity of a handler, e.g. `view:user/info` or `static:/abs/path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey(String);

impl HandlerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keyed, shareable handler.
#[derive(Clone)]
pub struct Handler {
    key: HandlerKey,
    inner: Arc<dyn RouteHandler>,
}

impl Handler {
    pub fn new(key: HandlerKey, handler: impl RouteHandler) -> Self {
        Self {
            key,
            inner: Arc::new(handler),
        }
    }

    pub fn key(&self) -> &HandlerKey {
        &self.key
    }

    /// Same underlying callable: equal keys or the same allocation.
    pub fn same_as(&self, other: &Handler) -> bool {
        self.key == other.key
            || std::ptr::eq(
                Arc::as_ptr(&self.inner) as *const (),
                Arc::as_ptr(&other.inner) as *const (),
            )
    }

    pub fn call(&self, ctx: RequestContext) -> HandlerFuture {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.key).finish()
    }
}

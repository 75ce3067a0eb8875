//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tower-http layers, engine entry point)
//!     → request.rs (buffer body, parse query, request ID, session user)
//!     → [routing: match + meta] → [security: policy]
//!     → dispatcher.rs (middleware.rs chain, handler.rs, failure boundary)
//!     → response.rs / error.rs (JSON envelope or raw bytes)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::AppContext;
pub use error::HttpError;
pub use handler::{Handler, HandlerKey, HandlerResult};
pub use request::{RequestContext, X_REQUEST_ID};
pub use response::ApiResponse;
pub use server::HttpServer;

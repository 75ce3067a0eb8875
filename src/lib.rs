//! Path-driven content router.
//!
//! Every request enters one engine handler and flows through:
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (tower-http layers, engine handler)
//!                       → routing::matcher   (normalize, exact, then patterns)
//!                       → routing::resolver  (RouteMeta: explicit, parsed, cached)
//!                       → security::policy   (headers, token, login, admin, method, cache)
//!                       → http::dispatcher   (middleware onion, handler, error rendering)
//!                           → theme    (Handlebars pages and views)
//!                           → delivery (static files, attachments, image transcoding)
//!                           → admin    (system routes)
//!     ◀──────────────  Response (terminal)
//!
//!     Cross-cutting: config, services (auth, options, persistent cache),
//!                    observability (tracing, metrics), lifecycle (startup, shutdown)
//! ```

pub mod admin;
pub mod config;
pub mod delivery;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod services;
pub mod theme;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

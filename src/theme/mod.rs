//! Theme subsystem.
//!
//! # Data Flow
//! ```text
//! Content route (theme page or view artifact)
//!     → render.rs (ThemeRenderer: page data, per-theme Handlebars registry)
//!         → resolver.rs (case-insensitive template, partial and directory lookup)
//!     → HTML response, or the theme `error` page on failure
//!
//! Boot:
//!     pages.rs  → CMS content routes (`/`, `/post/{id}`, ...)
//!     assets.rs → `/assets/<type>/...` routes for the active theme's files
//! ```

pub mod assets;
pub mod pages;
pub mod render;
pub mod resolver;

pub use render::{ThemeError, ThemeRenderer};
pub use resolver::TemplateResolver;

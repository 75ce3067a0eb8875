//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at boot):
//!     system routes, manifest + auto router (loader.rs), CMS pages, assets
//!     → table.rs (RouteTable::register, conflict detection)
//!     → frozen behind Arc
//!
//! Incoming Request (path + query):
//!     → matcher.rs (normalize, exact lookup, then parameterized patterns)
//!     → resolver.rs (MetaSource → RouteMeta via local and persistent tiers)
//!         → meta_parser.rs (restricted-literal meta block of a view artifact)
//!         → meta.rs (allow-list sanitization, defaults)
//!     → Return: Route + captures + RouteMeta, or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes registered at boot, immutable at runtime
//! - Exact routes beat parameterized ones; among patterns the first registered wins
//! - Match results and parsed meta are memoized; live-debug bypasses both

pub mod loader;
pub mod matcher;
pub mod meta;
pub mod meta_parser;
pub mod pattern;
pub mod resolver;
pub mod table;

pub use matcher::{MatchResult, Matcher};
pub use meta::RouteMeta;
pub use resolver::{MetaResolver, MetaSource};
pub use table::{RegistrationError, Route, RouteKind, RouteTable};

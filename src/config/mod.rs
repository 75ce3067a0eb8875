//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc<AppContext> to all subsystems
//!
//! Options file (JSON, runtime-mutable):
//!     watcher.rs detects change
//!     → FileOptions::reload
//!     → atomic swap of the options snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the route table is built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::AppConfig;
pub use schema::CacheConfig;
pub use schema::ListenerConfig;
pub use schema::RouteEntry;

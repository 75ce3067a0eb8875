//! External collaborators.
//!
//! # Data Flow
//! ```text
//! PolicyEnforcer ──verify token / session / admin──▶ auth.rs
//! ThemeRenderer  ──look up site options──────────▶ options.rs
//! MetaResolver   ──get/set named blob with TTL────▶ cache.rs
//! ```
//!
//! # Design Decisions
//! - Each collaborator is a narrow trait; the engine holds `Arc<dyn Trait>`
//! - The shipped implementations are small and config/file backed

pub mod auth;
pub mod cache;
pub mod options;

pub use auth::{Authenticator, Claims, ConfigAuthenticator};
pub use cache::{FileCache, MemoryCache, PersistentCache};
pub use options::{FileOptions, OptionsStore};

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + resolved RouteMeta:
//!     → policy.rs (PolicyEnforcer: headers, token, login, admin, method, cache)
//!         → headers.rs (CORS and JSON content type)
//!         → cache_control.rs (route directive vs global defaults)
//!     → rate_limit.rs (built-in `rate_limit` route middleware)
//!     → Pass to dispatcher
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first failing step short-circuits with its error
//! - Headers computed before a failure still reach the client (CORS on 401/403)
//! - No trust in client input

pub mod cache_control;
pub mod headers;
pub mod policy;
pub mod rate_limit;

pub use policy::{PolicyEnforcer, PolicyHeaders, PolicyOutcome};
pub use rate_limit::RateLimiter;

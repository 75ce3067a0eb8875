//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine, matcher, meta resolver, delivery, rate limiter
//!     → logging.rs (tracing events with request_id, path, route fields)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (when enabled)
//! ```

pub mod logging;
pub mod metrics;

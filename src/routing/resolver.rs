//! Route meta resolution with two cache tiers.
//!
//! # Data Flow
//! ```text
//! MetaSource::Explicit ──────────────────────────────▶ meta (no parsing)
//! MetaSource::Artifact(path)
//!     → process-local map            (hit → meta)
//!     → persistent cache "route_meta_<md5(path)>"
//!         stored mtime >= file mtime → meta, promoted to local
//!         stale                      → evict, fall through
//!     → read artifact, parse block, sanitize
//!     → write-through to both tiers
//! ```
//!
//! # Design Decisions
//! - Resolution never fails: parse and I/O errors log a warning and yield defaults
//! - Live-debug mode bypasses both tiers
//! - Persistent entries are keyed by the artifact path hash and validated
//!   against its modification time, so racing writers store identical values

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use serde_json::{json, Value};

use crate::observability::metrics;
use crate::routing::meta::RouteMeta;
use crate::routing::meta_parser::parse_meta;
use crate::services::cache::PersistentCache;

/// Where a route's meta comes from.
#[derive(Debug, Clone)]
pub enum MetaSource {
    /// Supplied at registration; bypasses parsing.
    Explicit(Arc<RouteMeta>),
    /// Parsed from the meta block of a view artifact.
    Artifact(PathBuf),
    /// Route defaults.
    Default,
}

impl MetaSource {
    pub fn explicit(meta: RouteMeta) -> Self {
        MetaSource::Explicit(Arc::new(meta))
    }
}

pub struct MetaResolver {
    local: DashMap<PathBuf, Arc<RouteMeta>>,
    persistent: Arc<dyn PersistentCache>,
    ttl_secs: u64,
    live: bool,
}

impl MetaResolver {
    pub fn new(persistent: Arc<dyn PersistentCache>, ttl_secs: u64, live: bool) -> Self {
        Self {
            local: DashMap::new(),
            persistent,
            ttl_secs,
            live,
        }
    }

    pub fn resolve(&self, source: &MetaSource) -> Arc<RouteMeta> {
        match source {
            MetaSource::Explicit(meta) => meta.clone(),
            MetaSource::Default => Arc::new(RouteMeta::default()),
            MetaSource::Artifact(path) => self.resolve_artifact(path),
        }
    }

    fn resolve_artifact(&self, path: &Path) -> Arc<RouteMeta> {
        if self.live {
            return Arc::new(read_artifact_meta(path));
        }

        if let Some(meta) = self.local.get(path) {
            metrics::record_meta_cache("local", "hit");
            return meta.clone();
        }
        metrics::record_meta_cache("local", "miss");

        let key = cache_key(path);
        let mtime = modified_secs(path);

        if let Some(meta) = self.load_persistent(&key, mtime) {
            let meta = Arc::new(meta);
            self.local.insert(path.to_path_buf(), meta.clone());
            return meta;
        }

        let meta = Arc::new(read_artifact_meta(path));
        self.persistent.set(
            &key,
            json!({ "meta": meta.to_value(), "mtime": mtime }),
            self.ttl_secs,
        );
        self.local.insert(path.to_path_buf(), meta.clone());
        meta
    }

    fn load_persistent(&self, key: &str, mtime: u64) -> Option<RouteMeta> {
        let Some(entry) = self.persistent.get(key) else {
            metrics::record_meta_cache("persistent", "miss");
            return None;
        };

        let stored_mtime = entry.get("mtime").and_then(Value::as_u64).unwrap_or(0);
        match entry.get("meta") {
            Some(meta) if stored_mtime >= mtime => {
                metrics::record_meta_cache("persistent", "hit");
                Some(RouteMeta::sanitize(meta))
            }
            _ => {
                tracing::debug!(key, stored_mtime, mtime, "Evicting stale route meta");
                metrics::record_meta_cache("persistent", "stale");
                self.persistent.delete(key);
                None
            }
        }
    }

    /// Drop the process-local tier. The persistent tier expires on its own.
    pub fn clear(&self) {
        self.local.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.local.len()
    }
}

/// Persistent cache key for an artifact.
pub fn cache_key(path: &Path) -> String {
    format!("route_meta_{:x}", md5::compute(path.to_string_lossy().as_bytes()))
}

fn modified_secs(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn read_artifact_meta(path: &Path) -> RouteMeta {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Cannot read view artifact, using default meta");
            return RouteMeta::default();
        }
    };
    match parse_meta(&source) {
        Ok(Some(value)) => RouteMeta::sanitize(&value),
        Ok(None) => RouteMeta::default(),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Invalid route meta block, using defaults");
            RouteMeta::default()
        }
    }
}

//! Options key-value collaborator.
//!
//! # Responsibilities
//! - Look up site options by name (title, description, url, ...)
//! - Accept scalar updates and persist them
//!
//! # Design Decisions
//! - Readers load an immutable snapshot through `ArcSwap` (no locks on read)
//! - Writers build a new map and swap it in; last writer wins
//! - Only JSON scalars are accepted by `set`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

pub trait OptionsStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    /// Store a scalar value. Returns false when rejected or not persisted.
    fn set(&self, name: &str, value: Value) -> bool;

    fn get_or(&self, name: &str, default: Value) -> Value {
        self.get(name).unwrap_or(default)
    }

    fn get_str(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("options file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("options file is not a JSON object: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Options loaded from a JSON object file.
pub struct FileOptions {
    path: Option<PathBuf>,
    snapshot: ArcSwap<HashMap<String, Value>>,
}

impl FileOptions {
    /// Options kept in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Load options from `path`. A missing file starts empty and is created on first `set`.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let options = Self {
            path: Some(path.to_path_buf()),
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        };
        if path.exists() {
            options.reload()?;
        }
        Ok(options)
    }

    /// Re-read the backing file and swap the snapshot.
    pub fn reload(&self) -> Result<(), OptionsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = fs::read_to_string(path)?;
        let map: HashMap<String, Value> = if content.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&content)?
        };
        tracing::debug!(path = ?path, count = map.len(), "Options loaded");
        self.snapshot.store(Arc::new(map));
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, map: &HashMap<String, Value>) -> Result<(), OptionsError> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_vec_pretty(map)?)?;
        }
        Ok(())
    }
}

impl OptionsStore for FileOptions {
    fn get(&self, name: &str) -> Option<Value> {
        self.snapshot.load().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) -> bool {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            tracing::warn!(option = name, "Rejected non-scalar option value");
            return false;
        }

        let mut next = HashMap::clone(&self.snapshot.load());
        next.insert(name.to_string(), value);

        if let Err(e) = self.persist(&next) {
            tracing::error!(option = name, error = %e, "Failed to persist option");
            return false;
        }
        self.snapshot.store(Arc::new(next));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_set_and_get() {
        let options = FileOptions::in_memory();
        assert!(options.get("title").is_none());
        assert!(options.set("title", json!("My Site")));
        assert_eq!(options.get_str("title").as_deref(), Some("My Site"));
        assert_eq!(options.get_or("missing", json!(3)), json!(3));
    }

    #[test]
    fn rejects_non_scalars() {
        let options = FileOptions::in_memory();
        assert!(!options.set("list", json!([1, 2])));
        assert!(!options.set("map", json!({ "a": 1 })));
        assert!(options.get("list").is_none());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        let options = FileOptions::load(&path).unwrap();
        assert!(options.set("per_page", json!(10)));

        let reopened = FileOptions::load(&path).unwrap();
        assert_eq!(reopened.get("per_page"), Some(json!(10)));

        fs::write(&path, r#"{"per_page": 20}"#).unwrap();
        reopened.reload().unwrap();
        assert_eq!(reopened.get_str("per_page").as_deref(), Some("20"));
    }

    #[test]
    fn malformed_file_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"title": "ok"}"#).unwrap();

        let options = FileOptions::load(&path).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(options.reload().is_err());
        assert_eq!(options.get_str("title").as_deref(), Some("ok"));
    }
}

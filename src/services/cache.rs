//! Persistent cache collaborator.
//!
//! Named JSON blobs with a TTL. Used for cross-request state such as parsed
//! route meta. Values written here must be pure functions of their key's
//! source content, so concurrent writers racing on one key are harmless.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub trait PersistentCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` for `ttl_secs` seconds (0 = no expiry).
    fn set(&self, key: &str, value: Value, ttl_secs: u64);

    fn delete(&self, key: &str);
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A stored entry with its expiry (seconds since epoch).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    created_at: u64,
    expires_at: Option<u64>,
}

impl CacheEntry {
    fn new(value: Value, ttl_secs: u64) -> Self {
        let now = now_secs();
        Self {
            value,
            created_at: now,
            expires_at: (ttl_secs > 0).then(|| now + ttl_secs),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > now_secs())
    }
}

/// Process-local cache with expiry.
#[derive(Default)]
pub struct MemoryCache {
    inner: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl PersistentCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entry = self.inner.get(key)?;
        if entry.is_live() {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.inner.remove(key);
        None
    }

    fn set(&self, key: &str, value: Value, ttl_secs: u64) {
        self.inner.insert(key.to_string(), CacheEntry::new(value, ttl_secs));
    }

    fn delete(&self, key: &str) {
        self.inner.remove(key);
    }
}

/// One JSON file per key under a directory.
///
/// File names are the md5 of the key, so any key is a safe file name.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:x}.json", md5::compute(key.as_bytes())))
    }
}

impl PersistentCache for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let content = fs::read(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        if entry.is_live() {
            Some(entry.value)
        } else {
            let _ = fs::remove_file(&path);
            None
        }
    }

    fn set(&self, key: &str, value: Value, ttl_secs: u64) {
        let entry = CacheEntry::new(value, ttl_secs);
        let result = serde_json::to_vec(&entry)
            .map_err(std::io::Error::from)
            .and_then(|bytes| fs::write(self.entry_path(key), bytes));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    fn delete(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_cache_operations() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").is_none());

        cache.set("k", json!({ "a": 1 }), 60);
        assert_eq!(cache.get("k"), Some(json!({ "a": 1 })));

        cache.delete("k");
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryCache::new();
        cache.inner.insert(
            "old".into(),
            CacheEntry { value: json!(1), created_at: 0, expires_at: Some(1) },
        );
        assert!(cache.get("old").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", json!("v"), 0);
        assert_eq!(cache.get("k"), Some(json!("v")));
    }

    #[test]
    fn file_cache_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.set("route_meta_abc", json!({ "mtime": 5 }), 3600);

        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get("route_meta_abc"), Some(json!({ "mtime": 5 })));

        reopened.delete("route_meta_abc");
        assert!(cache.get("route_meta_abc").is_none());
    }

    #[test]
    fn file_cache_discards_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        fs::write(cache.entry_path("bad"), b"{oops").unwrap();
        assert!(cache.get("bad").is_none());
        assert!(!cache.entry_path("bad").exists());
    }
}

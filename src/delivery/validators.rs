//! Strong cache validators: ETag and Last-Modified.
//!
//! Validators are derived per request from the file path and mtime; nothing
//! is stored.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

/// Seconds since the epoch (0 for pre-epoch times).
pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
}

/// Quoted md5 ETag of the given parts.
pub fn quoted_md5(parts: &[&str]) -> String {
    format!("\"{:x}\"", md5::compute(parts.concat()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    /// Quoted entity tag.
    pub etag: String,
    pub last_modified: SystemTime,
}

impl Validators {
    pub fn new(etag: String, last_modified: SystemTime) -> Self {
        Self { etag, last_modified }
    }

    /// `etag = md5(path + mtime)`.
    pub fn for_file(path: &Path, mtime: SystemTime) -> Self {
        let path = path.to_string_lossy();
        let secs = unix_secs(mtime).to_string();
        Self::new(quoted_md5(&[path.as_ref(), secs.as_str()]), mtime)
    }

    /// `If-None-Match` names this ETag, or `If-Modified-Since` is at or after mtime.
    pub fn is_not_modified(&self, request: &HeaderMap) -> bool {
        let etag_match = request
            .get_all(header::IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .any(|tag| tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == self.etag);
        if etag_match {
            return true;
        }

        request
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .is_some_and(|since| unix_secs(since) >= unix_secs(self.last_modified))
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&http_date(self.last_modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

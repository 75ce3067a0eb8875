//! Static file delivery with conditional caching.
//!
//! # Responsibilities
//! - Emit Cache-Control, Expires, Last-Modified and ETag on every answer
//! - Answer 304 when the client's validators still match
//! - Stream the file from disk, or gzip it in memory when the type and client allow it
//!
//! # Design Decisions
//! - Validators are recomputed per request from path and mtime
//! - Compression needs the route flag, the global flag, an allow-listed type
//!   and client support

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::delivery::compression::{accepts_gzip, gzip, is_compressible};
use crate::delivery::validators::Validators;
use crate::http::error::HttpError;
use crate::http::handler::{HandlerResult, RouteHandler};
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::routing::meta::CacheDirective;
use crate::security::cache_control::cache_headers;

#[derive(Debug, Clone, Copy)]
pub struct CachedDelivery {
    compress: bool,
}

impl CachedDelivery {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    pub async fn serve(
        &self,
        path: &Path,
        mime: &str,
        ttl_secs: u64,
        compress: bool,
        request: &HeaderMap,
    ) -> HandlerResult {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(HttpError::not_found());
        }
        let mtime = meta.modified()?;

        let validators = Validators::for_file(path, mtime);
        let mut headers = cache_headers(CacheDirective { enabled: true, time: ttl_secs });
        validators.apply(&mut headers);

        if validators.is_not_modified(request) {
            metrics::record_delivery("static", 304);
            return Ok(not_modified(headers));
        }

        if let Ok(value) = HeaderValue::from_str(mime) {
            headers.insert(header::CONTENT_TYPE, value);
        }

        let body = if compress && self.compress && is_compressible(mime) {
            headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
            if accepts_gzip(request) {
                let encoded = gzip(&tokio::fs::read(path).await?)?;
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                headers.insert(header::CONTENT_LENGTH, encoded.len().into());
                Body::from(encoded)
            } else {
                stream_file(path, meta.len(), &mut headers).await?
            }
        } else {
            stream_file(path, meta.len(), &mut headers).await?
        };

        tracing::trace!(path = %path.display(), "Serving file");
        metrics::record_delivery("static", 200);

        let mut response = Response::new(body);
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Uncompressed files stream from disk in chunks.
async fn stream_file(path: &Path, len: u64, headers: &mut HeaderMap) -> Result<Body, HttpError> {
    let file = tokio::fs::File::open(path).await?;
    headers.insert(header::CONTENT_LENGTH, len.into());
    Ok(Body::from_stream(ReaderStream::new(file)))
}

/// Empty 304 carrying the cache headers and validators.
pub fn not_modified(headers: HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    *response.headers_mut() = headers;
    response
}

/// Handler serving one file through `CachedDelivery`.
pub fn file_handler(path: PathBuf, mime: String, ttl_secs: u64, compress: bool) -> impl RouteHandler {
    move |ctx: RequestContext| {
        let path = path.clone();
        let mime = mime.clone();
        async move {
            ctx.app
                .delivery
                .serve(&path, &mime, ttl_secs, compress, &ctx.headers)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(name: &str, content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(k.clone(), v.parse().unwrap());
        }
        map
    }

    #[tokio::test]
    async fn serves_with_validators() {
        let (_dir, path) = fixture("site.css", "body{}");
        let response = CachedDelivery::new(true)
            .serve(&path, "text/css", 60, false, &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let h = response.headers();
        assert_eq!(h[header::CACHE_CONTROL], "public, max-age=60");
        assert_eq!(h[header::CONTENT_TYPE], "text/css");
        assert_eq!(h[header::CONTENT_LENGTH], "6");
        assert!(h.contains_key(header::ETAG));
        assert!(h.contains_key(header::LAST_MODIFIED));
        assert!(h.contains_key(header::EXPIRES));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"body{}");
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let (_dir, path) = fixture("site.css", "body{}");
        let delivery = CachedDelivery::new(true);
        let first = delivery.serve(&path, "text/css", 60, false, &HeaderMap::new()).await.unwrap();
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_string();

        let second = delivery
            .serve(&path, "text/css", 60, false, &headers(&[(header::IF_NONE_MATCH, &etag)]))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(second.headers()[header::ETAG], etag.as_str());
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn stale_if_modified_since_gets_full_body() {
        let (_dir, path) = fixture("a.txt", "hello");
        let response = CachedDelivery::new(true)
            .serve(
                &path,
                "text/plain",
                60,
                false,
                &headers(&[(header::IF_MODIFIED_SINCE, "Sun, 06 Nov 1994 08:49:37 GMT")]),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn gzip_when_allowed() {
        let content = "<p>hello</p>".repeat(50);
        let (_dir, path) = fixture("page.html", &content);
        let gzip_request = headers(&[(header::ACCEPT_ENCODING, "gzip")]);

        let response = CachedDelivery::new(true)
            .serve(&path, "text/html", 60, true, &gzip_request)
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        let len: usize = response.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
        assert!(len < content.len());

        let disabled = CachedDelivery::new(false)
            .serve(&path, "text/html", 60, true, &gzip_request)
            .await
            .unwrap();
        assert!(disabled.headers().get(header::CONTENT_ENCODING).is_none());

        let image = CachedDelivery::new(true)
            .serve(&path, "image/png", 60, true, &gzip_request)
            .await
            .unwrap();
        assert!(image.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn large_files_stream_whole() {
        let content = "x".repeat(200_000);
        let (_dir, path) = fixture("big.bin", &content);
        let response = CachedDelivery::new(true)
            .serve(&path, "application/octet-stream", 60, false, &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), content.len());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CachedDelivery::new(true)
            .serve(&dir.path().join("nope.css"), "text/css", 60, false, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = CachedDelivery::new(true)
            .serve(dir.path(), "text/css", 60, false, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

//! Attachment route: `/attachment/{filetype}/{filename}[?imgtype=<token>]`.
//!
//! # Responsibilities
//! - Sanitize the type, file name and transform token from the request
//! - Find the stored file through the `AttachmentIndex` collaborator
//! - Serve it through `CachedDelivery`, or through `ImageTranscoder` when a
//!   transform token is given for an image

use std::fs;
use std::path::{Path, PathBuf};

use crate::http::error::HttpError;
use crate::http::handler::HandlerResult;
use crate::http::request::RequestContext;
use crate::delivery::mime::mime_for_path;

/// Extensions the transcoder can decode.
const TRANSCODABLE: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl AttachmentType {
    pub const ALL: [AttachmentType; 5] = [
        AttachmentType::Image,
        AttachmentType::Video,
        AttachmentType::Audio,
        AttachmentType::Document,
        AttachmentType::Other,
    ];

    /// Known type name, or `None` ("any type").
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Some(AttachmentType::Image),
            "video" => Some(AttachmentType::Video),
            "audio" => Some(AttachmentType::Audio),
            "document" => Some(AttachmentType::Document),
            "other" => Some(AttachmentType::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentType::Image => "image",
            AttachmentType::Video => "video",
            AttachmentType::Audio => "audio",
            AttachmentType::Document => "document",
            AttachmentType::Other => "other",
        }
    }

    /// Extensions of the type. Empty means unrestricted.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AttachmentType::Image => &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "tiff", "ico"],
            AttachmentType::Video => &["mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "m4v"],
            AttachmentType::Audio => &["mp3", "wav", "ogg", "m4a", "aac", "flac", "wma"],
            AttachmentType::Document => &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt"],
            AttachmentType::Other => &[],
        }
    }

    pub fn accepts(self, path: &Path) -> bool {
        let allowed = self.extensions();
        allowed.is_empty() || extension(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Keep `[A-Za-z0-9._-]`, at most 255 bytes.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// Keep `[A-Za-z0-9_-]`.
pub fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect()
}

pub fn is_transcodable(path: &Path) -> bool {
    extension(path).is_some_and(|ext| TRANSCODABLE.contains(&ext.as_str()))
}

/// Lookup of stored attachments.
pub trait AttachmentIndex: Send + Sync {
    /// First stored file whose name starts with `filename`, restricted to
    /// `kind` (or any type).
    fn find(&self, kind: Option<AttachmentType>, filename: &str) -> Option<PathBuf>;
}

/// Scans `<upload_dir>/<type>/` on disk.
pub struct DiskAttachmentIndex {
    root: PathBuf,
}

impl DiskAttachmentIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AttachmentIndex for DiskAttachmentIndex {
    fn find(&self, kind: Option<AttachmentType>, filename: &str) -> Option<PathBuf> {
        if filename.is_empty() || filename.starts_with('.') {
            return None;
        }

        let kinds: &[AttachmentType] = match &kind {
            Some(kind) => std::slice::from_ref(kind),
            None => &AttachmentType::ALL,
        };

        kinds.iter().find_map(|kind| {
            let mut candidates: Vec<PathBuf> = fs::read_dir(self.root.join(kind.as_str()))
                .ok()?
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(filename))
                .map(|entry| entry.path())
                .filter(|path| kind.accepts(path))
                .collect();
            candidates.sort();
            candidates.into_iter().next()
        })
    }
}

/// Handler for the attachment route.
pub async fn serve_attachment(ctx: RequestContext) -> HandlerResult {
    let kind = ctx.param("filetype").and_then(AttachmentType::parse);
    let filename = sanitize_filename(ctx.param("filename").unwrap_or_default());
    if filename.is_empty() {
        return Err(HttpError::BadRequest("Invalid parameters".to_string()));
    }
    let token = sanitize_token(ctx.query_param("imgtype").unwrap_or_default());

    let app = ctx.app.clone();
    let index = app.attachments.clone();
    let lookup = filename.clone();
    let path = tokio::task::spawn_blocking(move || index.find(kind, &lookup))
        .await
        .map_err(HttpError::internal)?
        .ok_or_else(|| HttpError::NotFound("Attachment not found".to_string()))?;

    tracing::debug!(
        request_id = %ctx.request_id,
        filename = %filename,
        path = %path.display(),
        transform = %token,
        "Serving attachment"
    );

    if !token.is_empty() && is_transcodable(&path) {
        return app.transcoder.serve(path, &token, &ctx.headers).await;
    }

    let mime = mime_for_path(&path);
    app.delivery
        .serve(&path, &mime, app.config.delivery.attachment_ttl_secs, false, &ctx.headers)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uploads() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (kind, name) in [
            ("image", "cat-1700000000.png"),
            ("image", "cat-1700000000.txt"),
            ("document", "cat-1700000000.pdf"),
            ("other", "blob.bin"),
        ] {
            fs::create_dir_all(dir.path().join(kind)).unwrap();
            fs::write(dir.path().join(kind).join(name), b"x").unwrap();
        }
        dir
    }

    #[test]
    fn sanitizers() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("a b$c.png"), "abc.png");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 255);
        assert_eq!(sanitize_token("webp_10x10;rm -rf"), "webp_10x10rm-rf");
        assert_eq!(AttachmentType::parse(" IMAGE "), Some(AttachmentType::Image));
        assert_eq!(AttachmentType::parse("exe"), None);
    }

    #[test]
    fn finds_by_prefix_and_type() {
        let dir = uploads();
        let index = DiskAttachmentIndex::new(dir.path());

        let found = index.find(Some(AttachmentType::Image), "cat").unwrap();
        assert!(found.ends_with("image/cat-1700000000.png"));

        let found = index.find(Some(AttachmentType::Document), "cat-1700000000").unwrap();
        assert!(found.ends_with("document/cat-1700000000.pdf"));

        assert!(index.find(Some(AttachmentType::Video), "cat").is_none());
        assert!(index.find(None, "blob").unwrap().ends_with("other/blob.bin"));
        assert!(index.find(None, "").is_none());
        assert!(index.find(None, "..").is_none());
    }

    #[test]
    fn transcodable_extensions() {
        assert!(is_transcodable(Path::new("a.JPG")));
        assert!(!is_transcodable(Path::new("a.svg")));
        assert!(!is_transcodable(Path::new("a")));
    }
}

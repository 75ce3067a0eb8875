//! On-the-fly image transcoding.
//!
//! # Data Flow
//! ```text
//! token ("webp" | "400x300" | "webp_400x300")
//!     → parse_token (format + optional bounds, 1..=5000)
//!     → validators from (path, format, dims, quality, mtime) → 304?
//!     → spawn_blocking: decode → fit inside bounds (never upscale) → encode
//!     → bytes with 10-year cache headers
//! ```
//!
//! # Design Decisions
//! - Tokens matching no grammar are rejected, never guessed
//! - PNG output is composited on a transparent canvas
//! - WebP output is lossless; JPEG uses the configured quality
//! - AVIF output needs the `avif` cargo feature

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use regex::Regex;

use crate::delivery::static_files::not_modified;
use crate::delivery::validators::{quoted_md5, unix_secs, Validators};
use crate::http::error::HttpError;
use crate::http::handler::HandlerResult;
use crate::observability::metrics;
use crate::routing::meta::CacheDirective;
use crate::security::cache_control::cache_headers;

pub const MAX_DIMENSION: u32 = 5000;

/// Cache lifetime of transcoded images (10 years).
pub const TRANSCODE_TTL_SECS: u64 = 315_360_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Avif,
}

impl TargetFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(TargetFormat::Jpeg),
            "png" => Some(TargetFormat::Png),
            "gif" => Some(TargetFormat::Gif),
            "webp" => Some(TargetFormat::WebP),
            "avif" => Some(TargetFormat::Avif),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Gif => "gif",
            TargetFormat::WebP => "webp",
            TargetFormat::Avif => "avif",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::Gif => "image/gif",
            TargetFormat::WebP => "image/webp",
            TargetFormat::Avif => "image/avif",
        }
    }

    pub fn supports_alpha(self) -> bool {
        matches!(self, TargetFormat::Png | TargetFormat::WebP | TargetFormat::Avif | TargetFormat::Gif)
    }
}

/// Parsed transform token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub format: TargetFormat,
    /// Bounding box; `None` keeps the original size.
    pub bounds: Option<(u32, u32)>,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Invalid image processing parameters: {0}")]
    InvalidToken(String),

    #[error("Invalid dimensions: {width}x{height} (allowed 1..={max})", max = MAX_DIMENSION)]
    InvalidDimensions { width: u64, height: u64 },

    #[error("Image capability missing: {0}")]
    CapabilityMissing(&'static str),

    #[error("Failed to read source image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image file: {0}")]
    Decode(image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
}

impl From<TranscodeError> for HttpError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::InvalidToken(_) | TranscodeError::InvalidDimensions { .. } => {
                HttpError::BadRequest(err.to_string())
            }
            TranscodeError::Io(io) => HttpError::from(io),
            TranscodeError::CapabilityMissing(_) | TranscodeError::Decode(_) => HttpError::Server(err.to_string()),
            TranscodeError::Encode(_) => HttpError::internal(err),
        }
    }
}

fn dimensions_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+)$").expect("static regex"))
}

fn parse_dimensions(text: &str) -> Option<(u64, u64)> {
    let caps = dimensions_regex().captures(text)?;
    let parse = |i: usize| caps[i].parse::<u64>().unwrap_or(u64::MAX);
    Some((parse(1), parse(2)))
}

/// Parse a transform token against a source file.
///
/// Grammars, tried in order: bare format name, `WxH` (format from the
/// source extension), `format_WxH`.
pub fn parse_token(token: &str, source: &Path) -> Result<TranscodeRequest, TranscodeError> {
    let token = token.trim().to_ascii_lowercase();
    let invalid = || TranscodeError::InvalidToken(token.clone());

    let (format, dims) = if let Some(format) = TargetFormat::from_name(&token) {
        (format, None)
    } else if let Some(dims) = parse_dimensions(&token) {
        let format = source
            .extension()
            .and_then(|e| e.to_str())
            .and_then(TargetFormat::from_name)
            .ok_or_else(invalid)?;
        (format, Some(dims))
    } else {
        let parts: Vec<&str> = token.split('_').collect();
        match parts.as_slice() {
            [format, dims] => {
                let format = TargetFormat::from_name(format).ok_or_else(invalid)?;
                let dims = parse_dimensions(dims).ok_or_else(invalid)?;
                (format, Some(dims))
            }
            _ => return Err(invalid()),
        }
    };

    let bounds = match dims {
        None => None,
        Some((w, h)) => {
            let range = 1..=MAX_DIMENSION as u64;
            if !range.contains(&w) || !range.contains(&h) {
                return Err(TranscodeError::InvalidDimensions { width: w, height: h });
            }
            Some((w as u32, h as u32))
        }
    };

    Ok(TranscodeRequest { format, bounds })
}

/// Size that fits `(w, h)` inside the bounds, preserving aspect and never upscaling.
pub fn fit_within(original: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (ow, oh) = (original.0 as f64, original.1 as f64);
    let scale = (bounds.0 as f64 / ow).min(bounds.1 as f64 / oh).min(1.0);
    let w = (ow * scale).round().max(1.0) as u32;
    let h = (oh * scale).round().max(1.0) as u32;
    (w, h)
}

fn ensure_capability(format: TargetFormat) -> Result<(), TranscodeError> {
    if format == TargetFormat::Avif && !cfg!(feature = "avif") {
        return Err(TranscodeError::CapabilityMissing("avif encoder"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct ImageTranscoder {
    quality: u8,
}

impl ImageTranscoder {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode, resize and re-encode. Blocking.
    pub fn transcode(&self, source: &Path, request: &TranscodeRequest) -> Result<Vec<u8>, TranscodeError> {
        ensure_capability(request.format)?;

        let raw = std::fs::read(source)?;
        let mut img = image::load_from_memory(&raw).map_err(TranscodeError::Decode)?;
        if request.format.supports_alpha() {
            img = DynamicImage::ImageRgba8(img.to_rgba8());
        }

        if let Some(bounds) = request.bounds {
            let original = (img.width(), img.height());
            let (w, h) = fit_within(original, bounds);
            if (w, h) != original {
                img = img.resize_exact(w, h, FilterType::Lanczos3);
            }
            if request.format == TargetFormat::Png {
                let mut canvas = RgbaImage::new(w, h);
                imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
                img = DynamicImage::ImageRgba8(canvas);
            }
        }

        self.encode(img, request.format)
    }

    fn encode(&self, img: DynamicImage, format: TargetFormat) -> Result<Vec<u8>, TranscodeError> {
        let mut out = Vec::new();
        match format {
            TargetFormat::Jpeg => {
                let rgb = img.to_rgb8();
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.quality))
                    .map_err(TranscodeError::Encode)?;
            }
            TargetFormat::Png => write_rgba(&img, ImageFormat::Png, &mut out)?,
            TargetFormat::Gif => write_rgba(&img, ImageFormat::Gif, &mut out)?,
            TargetFormat::WebP => write_rgba(&img, ImageFormat::WebP, &mut out)?,
            #[cfg(feature = "avif")]
            TargetFormat::Avif => write_rgba(&img, ImageFormat::Avif, &mut out)?,
            #[cfg(not(feature = "avif"))]
            TargetFormat::Avif => return Err(TranscodeError::CapabilityMissing("avif encoder")),
        }
        Ok(out)
    }

    /// Entity tag of one transform of a source file.
    pub fn etag(&self, source: &Path, request: &TranscodeRequest, mtime_secs: u64) -> String {
        let dims = request
            .bounds
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_default();
        quoted_md5(&[
            source.to_string_lossy().as_ref(),
            request.format.as_str(),
            &dims,
            &self.quality.to_string(),
            &mtime_secs.to_string(),
        ])
    }

    /// Transcode and answer with cache validators of the transform.
    pub async fn serve(&self, source: PathBuf, token: &str, request: &HeaderMap) -> HandlerResult {
        let transform = parse_token(token, &source)?;
        ensure_capability(transform.format)?;

        let mtime = tokio::fs::metadata(&source).await?.modified()?;
        let validators = Validators::new(self.etag(&source, &transform, unix_secs(mtime)), mtime);
        let mut headers = cache_headers(CacheDirective { enabled: true, time: TRANSCODE_TTL_SECS });
        validators.apply(&mut headers);

        if validators.is_not_modified(request) {
            metrics::record_delivery("transcode", 304);
            return Ok(not_modified(headers));
        }

        let started = Instant::now();
        let transcoder = *self;
        let path = source.clone();
        let bytes = tokio::task::spawn_blocking(move || transcoder.transcode(&path, &transform))
            .await
            .map_err(HttpError::internal)??;
        metrics::record_transcode(transform.format.as_str(), started);

        tracing::debug!(
            source = %source.display(),
            format = transform.format.as_str(),
            bounds = ?transform.bounds,
            bytes = bytes.len(),
            "Image transcoded"
        );

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(transform.format.mime()));
        headers.insert(header::CONTENT_LENGTH, bytes.len().into());
        metrics::record_delivery("transcode", 200);

        let mut response = Response::new(Body::from(bytes));
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn write_rgba(img: &DynamicImage, format: ImageFormat, out: &mut Vec<u8>) -> Result<(), TranscodeError> {
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_to(&mut std::io::Cursor::new(out), format)
        .map_err(TranscodeError::Encode)
}

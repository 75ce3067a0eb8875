//! Static, asset and attachment delivery.
//!
//! # Data Flow
//! ```text
//! static / asset route ──────────────▶ static_files.rs (CachedDelivery)
//!                                          → validators.rs (ETag, Last-Modified, 304)
//!                                          → compression.rs (gzip)
//! /attachment/{filetype}/{filename}
//!     → attachment.rs (sanitize, AttachmentIndex lookup)
//!     → ?imgtype=token on an image ──▶ transcode.rs (ImageTranscoder)
//!     → otherwise ───────────────────▶ static_files.rs (mime.rs content type)
//! ```

pub mod attachment;
pub mod compression;
pub mod mime;
pub mod static_files;
pub mod transcode;
pub mod validators;

pub use attachment::{AttachmentIndex, AttachmentType, DiskAttachmentIndex};
pub use static_files::CachedDelivery;
pub use transcode::ImageTranscoder;

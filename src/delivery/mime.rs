//! MIME types by file extension.

use std::path::Path;

/// Extensions with a fixed content type. Anything else goes through `mime_guess`.
const TABLE: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("mp4", "video/mp4"),
    ("mp3", "audio/mpeg"),
    ("pdf", "application/pdf"),
];

pub fn mime_for_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| (*mime).to_string())
        .unwrap_or_else(|| mime_guess::from_ext(&ext).first_or_octet_stream().essence_str().to_string())
}

pub fn mime_for_path(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(mime_for_extension)
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_then_guess() {
        assert_eq!(mime_for_extension("CSS"), "text/css");
        assert_eq!(mime_for_extension("js"), "application/javascript");
        assert_eq!(mime_for_extension("csv"), "text/csv");
        assert_eq!(mime_for_extension("nope-ext"), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("/a/b/logo.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("/a/b/README")), "application/octet-stream");
    }
}

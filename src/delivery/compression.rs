//! Gzip negotiation and encoding.

use std::io::Write;

use axum::http::{header, HeaderMap};
use flate2::write::GzEncoder;
use flate2::Compression;

/// MIME types eligible for gzip.
pub const COMPRESSIBLE: &[&str] = &[
    "text/html",
    "text/css",
    "text/javascript",
    "application/javascript",
    "application/json",
    "text/xml",
    "application/xml",
];

pub fn is_compressible(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    COMPRESSIBLE.iter().any(|m| m.eq_ignore_ascii_case(essence))
}

/// Whether `Accept-Encoding` allows gzip (a `q=0` entry refuses it).
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| {
            let mut parts = coding.split(';').map(str::trim);
            let name = parts.next().unwrap_or("");
            if !name.eq_ignore_ascii_case("gzip") && name != "*" {
                return false;
            }
            !parts.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            })
        })
}

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, value.parse().unwrap());
        headers
    }

    #[test]
    fn compressible_types() {
        assert!(is_compressible("text/html"));
        assert!(is_compressible("application/json; charset=utf-8"));
        assert!(!is_compressible("image/png"));
    }

    #[test]
    fn negotiates_gzip() {
        assert!(accepts_gzip(&accept("gzip, deflate, br")));
        assert!(accepts_gzip(&accept("br;q=1.0, GZIP;q=0.5")));
        assert!(!accepts_gzip(&accept("gzip;q=0")));
        assert!(!accepts_gzip(&accept("br")));
        assert!(!accepts_gzip(&HeaderMap::new()));
    }

    #[test]
    fn gzip_output_decodes() {
        let body = b"body { color: red; } ".repeat(20);
        let encoded = gzip(&body).unwrap();
        let mut decoded = Vec::new();
        GzDecoder::new(&encoded[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }
}

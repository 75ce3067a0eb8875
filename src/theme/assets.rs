//! Theme asset routes.
//!
//! Every file below the theme's `assets` directory is served at
//! `/assets/<type-dir>[/<subdir>...]/<file-stem>`, where the type dir comes
//! from the extension.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::delivery::mime::mime_for_extension;
use crate::delivery::static_files::file_handler;
use crate::http::handler::{Handler, HandlerKey};
use crate::routing::meta::RouteMeta;
use crate::routing::resolver::MetaSource;
use crate::routing::table::{RegistrationError, RouteKind, RouteTable};
use crate::theme::resolver::find_entry;

/// URL type directory for an extension.
pub fn type_dir(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "css" => "css",
        "js" | "mjs" => "js",
        "json" => "json",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" | "webp" | "avif" => "images",
        "woff" | "woff2" | "ttf" | "otf" | "eot" => "fonts",
        _ => "files",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRoute {
    pub path: String,
    pub file: PathBuf,
    pub mime: String,
}

/// Asset routes of a theme, in file-name order.
pub fn scan_assets(theme_root: &Path) -> Vec<AssetRoute> {
    let Some(assets) = find_entry(theme_root, "assets").filter(|p| p.is_dir()) else {
        return Vec::new();
    };

    WalkDir::new(&assets)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| asset_route(&assets, entry.path()))
        .collect()
}

/// Braces would turn a segment into a route parameter.
fn is_literal_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['{', '}'])
}

fn asset_route(assets: &Path, file: &Path) -> Option<AssetRoute> {
    let stem = file.file_stem()?.to_str()?;
    if !is_literal_segment(stem) {
        return None;
    }
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");

    let mut path = format!("/assets/{}", type_dir(ext));
    let parent = file.parent()?.strip_prefix(assets).ok()?;
    for component in parent.components() {
        let segment = component.as_os_str().to_str()?;
        if !is_literal_segment(segment) {
            tracing::debug!(file = %file.display(), "Skipping asset below a brace-named directory");
            return None;
        }
        path.push('/');
        path.push_str(segment);
    }
    path.push('/');
    path.push_str(stem);

    Some(AssetRoute {
        path,
        file: file.to_path_buf(),
        mime: mime_for_extension(ext),
    })
}

/// Register the asset routes of a theme. Conflicting paths are skipped.
pub fn register_assets(
    table: &mut RouteTable,
    theme_root: &Path,
    ttl_secs: u64,
) -> Result<usize, RegistrationError> {
    let mut registered = 0;
    for asset in scan_assets(theme_root) {
        let handler = Handler::new(
            HandlerKey::new(format!("static:{}", asset.file.display())),
            file_handler(asset.file.clone(), asset.mime.clone(), ttl_secs, false),
        );
        let site = format!("theme asset {}", asset.file.display());
        match table.register_at(
            &asset.path,
            handler,
            MetaSource::explicit(RouteMeta::static_asset()),
            RouteKind::Asset,
            site,
        ) {
            Ok(_) => registered += 1,
            Err(RegistrationError::Conflict { path, existing_site, .. }) => {
                tracing::warn!(
                    path = %path,
                    file = %asset.file.display(),
                    existing = %existing_site,
                    "Asset route already taken, skipping"
                );
            }
            Err(other) => return Err(other),
        }
    }
    tracing::info!(assets = registered, theme = %theme_root.display(), "Theme asset routes registered");
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scans_assets_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("Assets");
        fs::create_dir_all(assets.join("css")).unwrap();
        fs::create_dir_all(assets.join("img/icons")).unwrap();
        fs::write(assets.join("css/main.css"), "body{}").unwrap();
        fs::write(assets.join("img/icons/star.svg"), "<svg/>").unwrap();
        fs::write(assets.join("app.js"), "1").unwrap();
        fs::write(assets.join("notes.xyz"), "?").unwrap();

        let routes = scan_assets(dir.path());
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/assets/js/app", "/assets/css/css/main", "/assets/images/img/icons/star", "/assets/files/notes"]
        );
        assert_eq!(routes[0].mime, "application/javascript");
    }

    #[test]
    fn conflicts_are_skipped() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("site.css"), "a").unwrap();
        fs::write(assets.join("site.CSS"), "b").unwrap();

        let mut table = RouteTable::new();
        assert_eq!(register_assets(&mut table, dir.path(), 60).unwrap(), 1);
        assert!(table.get("/assets/css/site").is_some());
    }

    #[test]
    fn brace_names_never_become_parameters() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir_all(assets.join("{x}")).unwrap();
        fs::write(assets.join("{x}/a.css"), "a").unwrap();
        fs::write(assets.join("{y}.css"), "b").unwrap();
        fs::write(assets.join("ok.css"), "c").unwrap();

        let paths: Vec<String> = scan_assets(dir.path()).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/assets/css/ok"]);
    }

    #[test]
    fn no_assets_dir() {
        let dir = TempDir::new().unwrap();
        assert!(scan_assets(dir.path()).is_empty());
    }
}

//! Route sources backed by view artifacts: the config manifest and the auto router.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::schema::RoutingConfig;
use crate::http::handler::{Handler, HandlerKey, RouteHandler};
use crate::http::request::RequestContext;
use crate::routing::meta::RouteMeta;
use crate::routing::resolver::MetaSource;
use crate::routing::table::{Registered, RegistrationError, RouteKind, RouteTable};
use crate::theme::resolver::{find_template, TEMPLATE_EXTENSIONS};

#[derive(Debug, thiserror::Error)]
pub enum RouteLoadError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("route '{path}' names view '{view}', which does not exist under the views directory")]
    MissingView { path: String, view: String },
}

/// Handler rendering a view artifact through the active theme.
pub fn view_handler(file: PathBuf) -> impl RouteHandler {
    move |ctx: RequestContext| {
        let file = file.clone();
        async move { ctx.app.theme.render_view(&file, &ctx).await }
    }
}

/// Keyed by the canonical file, so every spelling that reaches one view
/// yields the same handler.
fn view(views_dir: &Path, file: PathBuf) -> Handler {
    let canonical = file.canonicalize().unwrap_or_else(|_| file.clone());
    let root = views_dir.canonicalize().unwrap_or_else(|_| views_dir.to_path_buf());
    let key = match canonical.strip_prefix(&root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => canonical.display().to_string(),
    };
    Handler::new(HandlerKey::new(format!("view:{}", key)), view_handler(file))
}

/// Register `[[routing.routes]]`. A missing view aborts boot.
pub fn register_manifest(
    table: &mut RouteTable,
    routing: &RoutingConfig,
    views_dir: &Path,
) -> Result<usize, RouteLoadError> {
    for (i, entry) in routing.routes.iter().enumerate() {
        let file = find_template(views_dir, &entry.view).ok_or_else(|| RouteLoadError::MissingView {
            path: entry.path.clone(),
            view: entry.view.clone(),
        })?;

        let meta = match &entry.meta {
            Some(value) => MetaSource::explicit(RouteMeta::sanitize(value)),
            None => MetaSource::Artifact(file.clone()),
        };
        table.register_at(
            &entry.path,
            view(views_dir, file),
            meta,
            RouteKind::View,
            format!("manifest routing.routes[{}]", i),
        )?;
    }
    Ok(routing.routes.len())
}

/// Route path of a view file: lowercased, `_` as `-`, extension dropped.
pub fn auto_path(rel: &Path) -> Option<String> {
    let stem = rel.with_extension("");
    let mut path = String::new();
    for component in stem.components() {
        let part = component.as_os_str().to_str()?;
        path.push('/');
        path.push_str(&part.to_lowercase().replace('_', "-"));
    }
    (!path.is_empty()).then_some(path)
}

/// `/dir/index` also answers `/dir`, and `/index` answers `/`.
fn index_parent(path: &str) -> Option<&str> {
    let parent = path.strip_suffix("/index")?;
    Some(if parent.is_empty() { "/" } else { parent })
}

fn is_view_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}

/// Register every view under `views_dir` by its file path.
pub fn register_auto_routes(table: &mut RouteTable, views_dir: &Path) -> Result<usize, RouteLoadError> {
    if !views_dir.is_dir() {
        tracing::warn!(dir = %views_dir.display(), "Auto router enabled but views directory is missing");
        return Ok(0);
    }

    let mut registered = 0;
    let files = WalkDir::new(views_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_view_file(entry.path()));

    for entry in files {
        let file = entry.path().to_path_buf();
        let Ok(rel) = file.strip_prefix(views_dir) else { continue };
        let Some(path) = auto_path(rel) else { continue };
        let site = format!("auto router {}", rel.display());

        let mut paths = vec![path.as_str()];
        paths.extend(index_parent(&path));
        for route_path in paths {
            let outcome = table.register_at(
                route_path,
                view(views_dir, file.clone()),
                MetaSource::Artifact(file.clone()),
                RouteKind::View,
                site.clone(),
            )?;
            if outcome == Registered::Added {
                registered += 1;
            }
        }
    }
    tracing::info!(routes = registered, dir = %views_dir.display(), "Auto router registered views");
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteEntry;
    use std::fs;
    use tempfile::TempDir;

    fn views() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("User")).unwrap();
        fs::write(dir.path().join("index.hbs"), "home").unwrap();
        fs::write(dir.path().join("User/Sub_Name.hbs"), "sub").unwrap();
        fs::write(dir.path().join("User/index.html"), "users").unwrap();
        fs::write(dir.path().join("User/notes.txt"), "skip").unwrap();
        dir
    }

    #[test]
    fn auto_paths() {
        assert_eq!(auto_path(Path::new("Dir/Sub_Name.hbs")).as_deref(), Some("/dir/sub-name"));
        assert_eq!(index_parent("/index"), Some("/"));
        assert_eq!(index_parent("/user/index"), Some("/user"));
        assert_eq!(index_parent("/user/info"), None);
    }

    #[test]
    fn auto_router_registers_views_and_index_parents() {
        let dir = views();
        let mut table = RouteTable::new();
        assert_eq!(register_auto_routes(&mut table, dir.path()).unwrap(), 5);

        for path in ["/", "/index", "/user", "/user/index", "/user/sub-name"] {
            assert!(table.get(path).is_some(), "missing {}", path);
        }
        assert!(table.get("/user/notes").is_none());
        assert_eq!(table.get("/user").unwrap().handler.key().as_str(), "view:User/index.html");
        assert!(matches!(table.get("/user/sub-name").unwrap().meta, MetaSource::Artifact(_)));
    }

    #[test]
    fn manifest_with_explicit_meta() {
        let dir = views();
        let routing = RoutingConfig {
            routes: vec![
                RouteEntry {
                    path: "/people/{name}".to_string(),
                    view: "user/sub_name".to_string(),
                    meta: Some(serde_json::json!({ "requireLogin": true, "bogus": 1 })),
                },
                RouteEntry {
                    path: "/home".to_string(),
                    view: "index".to_string(),
                    meta: None,
                },
            ],
            ..RoutingConfig::default()
        };

        let mut table = RouteTable::new();
        assert_eq!(register_manifest(&mut table, &routing, dir.path()).unwrap(), 2);

        let route = table.get("/people/{name}").unwrap();
        assert_eq!(route.site, "manifest routing.routes[0]");
        match &route.meta {
            MetaSource::Explicit(meta) => assert!(meta.require_login.is_on()),
            other => panic!("expected explicit meta, got {:?}", other),
        }
        assert!(matches!(table.get("/home").unwrap().meta, MetaSource::Artifact(_)));
    }

    #[test]
    fn manifest_and_auto_router_share_a_view() {
        let dir = views();
        let routing = RoutingConfig {
            routes: vec![RouteEntry {
                path: "/user/sub-name".to_string(),
                view: "USER/Sub_Name".to_string(),
                meta: None,
            }],
            ..RoutingConfig::default()
        };

        let mut table = RouteTable::new();
        register_manifest(&mut table, &routing, dir.path()).unwrap();
        assert_eq!(register_auto_routes(&mut table, dir.path()).unwrap(), 4);

        let route = table.get("/user/sub-name").unwrap();
        assert_eq!(route.handler.key().as_str(), "view:User/Sub_Name.hbs");
        assert_eq!(route.site, "manifest routing.routes[0]");
    }

    #[test]
    fn manifest_missing_view_fails() {
        let dir = views();
        let routing = RoutingConfig {
            routes: vec![RouteEntry {
                path: "/x".to_string(),
                view: "nope".to_string(),
                meta: None,
            }],
            ..RoutingConfig::default()
        };
        let err = register_manifest(&mut RouteTable::new(), &routing, dir.path()).unwrap_err();
        assert!(matches!(err, RouteLoadError::MissingView { .. }));
    }
}

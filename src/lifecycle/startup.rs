//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the collaborators (persistent cache, options store, authenticator)
//! - Register every route source into one table, then freeze it
//! - Assemble the `AppContext` shared by all requests
//!
//! # Design Decisions
//! - Fail fast: a route conflict or a missing manifest view aborts boot
//! - Route sources register in a fixed order: system, manifest, auto router,
//!   content pages, theme assets, attachments

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::RecommendedWatcher;

use crate::admin::register_system_routes;
use crate::config::schema::{AppConfig, CacheDriver, OptionsConfig};
use crate::config::watcher::OptionsWatcher;
use crate::delivery::attachment::{serve_attachment, DiskAttachmentIndex};
use crate::delivery::{CachedDelivery, ImageTranscoder};
use crate::http::context::AppContext;
use crate::http::dispatcher::Dispatcher;
use crate::http::handler::{Handler, HandlerKey};
use crate::http::middleware::MiddlewareRegistry;
use crate::routing::loader::{register_auto_routes, register_manifest, RouteLoadError};
use crate::routing::matcher::Matcher;
use crate::routing::meta::RouteMeta;
use crate::routing::resolver::{MetaResolver, MetaSource};
use crate::routing::table::{RegistrationError, RouteKind, RouteTable};
use crate::security::policy::PolicyEnforcer;
use crate::services::options::OptionsError;
use crate::services::{
    Authenticator, ConfigAuthenticator, FileCache, FileOptions, MemoryCache, OptionsStore, PersistentCache,
};
use crate::theme::assets::register_assets;
use crate::theme::pages::register_cms_routes;
use crate::theme::render::ThemeRenderer;

pub const ATTACHMENT_ROUTE: &str = "/attachment/{filetype}/{filename}";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),
    #[error("route loading failed: {0}")]
    Routes(#[from] RouteLoadError),
    #[error("options store: {0}")]
    Options(#[from] OptionsError),
    #[error("cache directory: {0}")]
    Cache(#[source] std::io::Error),
    #[error("options watcher: {0}")]
    Watch(#[from] notify::Error),
}

/// A booted engine.
pub struct Booted {
    pub app: Arc<AppContext>,
    /// Keeps the options file watcher running while held.
    pub watcher: Option<RecommendedWatcher>,
}

pub fn build_context(config: AppConfig) -> Result<Booted, StartupError> {
    let live = config.debug.live;
    if live {
        tracing::warn!("Live-debug mode: process caches are bypassed");
    }

    let cache: Arc<dyn PersistentCache> = match config.cache.driver {
        CacheDriver::Memory => Arc::new(MemoryCache::new()),
        CacheDriver::File => Arc::new(FileCache::open(Path::new(&config.cache.dir)).map_err(StartupError::Cache)?),
    };
    let (options, watcher) = open_options(&config.options)?;
    let auth: Arc<dyn Authenticator> = Arc::new(ConfigAuthenticator::new(&config.auth));
    let theme = ThemeRenderer::new(&config.theme, options.clone(), live);

    let table = Arc::new(build_route_table(&config, &theme)?);

    let matcher = Matcher::new(table.clone(), &config.routing, live);
    let resolver = MetaResolver::new(cache.clone(), config.cache.meta_ttl_secs, live);
    let policy = PolicyEnforcer::new(&config, auth.clone());
    let dispatcher = Dispatcher::new(
        MiddlewareRegistry::with_builtins(&config.middleware),
        config.middleware.global.clone(),
    );
    let delivery = CachedDelivery::new(config.delivery.compress);
    let transcoder = ImageTranscoder::new(config.delivery.transcode_quality);
    let attachments = Arc::new(DiskAttachmentIndex::new(PathBuf::from(&config.delivery.upload_dir)));

    let app = Arc::new(AppContext {
        config,
        table,
        matcher,
        resolver,
        policy,
        dispatcher,
        theme,
        delivery,
        transcoder,
        attachments,
        auth,
        options,
        cache,
    });
    Ok(Booted { app, watcher })
}

/// Register every route source, in boot order.
pub fn build_route_table(config: &AppConfig, theme: &ThemeRenderer) -> Result<RouteTable, StartupError> {
    let mut table = RouteTable::new();
    let views_dir = Path::new(&config.routing.views_dir);

    let system = register_system_routes(&mut table)?;
    let manifest = register_manifest(&mut table, &config.routing, views_dir)?;
    let auto = if config.routing.auto_router {
        register_auto_routes(&mut table, views_dir)?
    } else {
        0
    };
    let pages = if config.theme.cms_routes {
        register_cms_routes(&mut table)?
    } else {
        0
    };
    let assets = match theme.resolver().theme_dir(theme.active()) {
        Some(root) if config.theme.asset_routes => {
            register_assets(&mut table, &root, config.delivery.static_ttl_secs)?
        }
        Some(_) => 0,
        None => {
            tracing::warn!(theme = %theme.active(), dir = %config.theme.dir, "Active theme not found");
            0
        }
    };

    table.register_at(
        ATTACHMENT_ROUTE,
        Handler::new(HandlerKey::new("attachment"), serve_attachment),
        MetaSource::explicit(RouteMeta::static_asset()),
        RouteKind::Attachment,
        "attachment route",
    )?;

    tracing::info!(
        routes = table.len(),
        system,
        manifest,
        auto,
        pages,
        assets,
        "Route table built"
    );
    Ok(table)
}

fn open_options(config: &OptionsConfig) -> Result<(Arc<dyn OptionsStore>, Option<RecommendedWatcher>), StartupError> {
    let Some(file) = &config.file else {
        return Ok((Arc::new(FileOptions::in_memory()), None));
    };
    let path = Path::new(file);
    let options = Arc::new(FileOptions::load(path)?);

    let watcher = if config.watch && path.exists() {
        Some(OptionsWatcher::new(path, options.clone()).run()?)
    } else {
        if config.watch {
            tracing::warn!(path = %path.display(), "Options file missing, not watching");
        }
        None
    };
    let store: Arc<dyn OptionsStore> = options;
    Ok((store, watcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteEntry;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.theme.dir = root.join("themes").display().to_string();
        config.routing.views_dir = root.join("views").display().to_string();
        config.delivery.upload_dir = root.join("uploads").display().to_string();
        config
    }

    #[test]
    fn boots_with_every_route_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("themes/default/assets")).unwrap();
        fs::write(dir.path().join("themes/default/index.hbs"), "home").unwrap();
        fs::write(dir.path().join("themes/default/assets/site.css"), "body{}").unwrap();
        fs::create_dir_all(dir.path().join("views/user")).unwrap();
        fs::write(dir.path().join("views/user/info.hbs"), "info").unwrap();

        let mut config = config(dir.path());
        config.routing.auto_router = true;
        config.routing.routes.push(RouteEntry {
            path: "/me".to_string(),
            view: "user/info".to_string(),
            meta: None,
        });

        let booted = build_context(config).unwrap();
        let table = &booted.app.table;
        for path in ["/system/info", "/me", "/user/info", "/", "/assets/css/site", ATTACHMENT_ROUTE] {
            assert!(table.get(path).is_some(), "missing {}", path);
        }
        assert!(booted.watcher.is_none());
    }

    #[test]
    fn missing_manifest_view_aborts_boot() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.routing.routes.push(RouteEntry {
            path: "/me".to_string(),
            view: "nope".to_string(),
            meta: None,
        });
        assert!(matches!(build_context(config), Err(StartupError::Routes(_))));
    }
}

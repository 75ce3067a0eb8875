//! Shared fixtures for integration tests: a site on disk and an engine built from it.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use content_router::config::schema::{ApiToken, RouteEntry};
use content_router::http::AppContext;
use content_router::lifecycle::build_context;
use content_router::{AppConfig, HttpServer};

pub const USER_TOKEN: &str = "user-token";
pub const ADMIN_TOKEN: &str = "admin-token";

/// A temporary site: theme, views and uploads.
pub struct Site {
    pub dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(root, "themes/default/index.hbs", "home {{route.path}}");
        write(root, "themes/default/post.hbs", "{{> header}}post {{route.params.id}}");
        write(root, "themes/default/error.hbs", "error {{code}}: {{message}}");
        write(root, "themes/default/partials/header.hbs", "<header>{{site.theme}}</header>");
        write(root, "themes/default/assets/site.css", "body { color: red; }");

        write(
            root,
            "views/user/info.hbs",
            "{{!-- RouteMeta = [ 'requireLogin' => true, 'method' => ['GET'] ]; --}}user {{user}}",
        );
        write(root, "views/open.hbs", "open {{route.params.name}}|{{route.query.q}}");

        fs::create_dir_all(root.join("uploads/image")).unwrap();
        image::RgbImage::from_pixel(16, 12, image::Rgb([200, 30, 30]))
            .save(root.join("uploads/image/pic-1700000000.png"))
            .unwrap();
        write(root, "uploads/document/report-1.pdf", "%PDF-1.4");

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Config pointing at this site, with test tokens and a route manifest.
    pub fn config(&self) -> AppConfig {
        let root = self.path();
        let mut config = AppConfig::default();
        config.theme.dir = root.join("themes").display().to_string();
        config.routing.views_dir = root.join("views").display().to_string();
        config.delivery.upload_dir = root.join("uploads").display().to_string();
        config.middleware.rate_limit.requests_per_second = 1;
        config.middleware.rate_limit.burst_size = 2;
        config.auth.tokens = vec![
            ApiToken { token: USER_TOKEN.into(), user_id: 1, username: "user".into() },
            ApiToken { token: ADMIN_TOKEN.into(), user_id: 2, username: "admin".into() },
        ];
        config.auth.admins = vec![2];

        let routes = [
            ("/user/info", "user/info", None),
            ("/people/list", "open", None),
            ("/people/{name}", "open", None),
            ("/limited", "open", Some(json!({ "middleware": ["rate_limit"] }))),
            ("/broken", "open", Some(json!({ "middleware": ["nope"] }))),
            ("/cached", "open", Some(json!({ "cache": { "enabled": true, "time": 60 } }))),
            ("/submit", "open", Some(json!({ "method": ["POST"], "cache": { "enabled": true, "time": 60 } }))),
            ("/secure", "open", Some(json!({ "token": true }))),
            ("/created", "open", Some(json!({ "code": 201 }))),
            (
                "/private",
                "open",
                Some(json!({ "requireLogin": true, "cache": { "enabled": true, "time": 60 } })),
            ),
        ];
        config.routing.routes = routes
            .into_iter()
            .map(|(path, view, meta)| RouteEntry { path: path.into(), view: view.into(), meta })
            .collect();
        config
    }
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn engine(config: AppConfig) -> (Arc<AppContext>, Router) {
    let app = build_context(config).unwrap().app;
    let router = HttpServer::new(app.clone()).router();
    (app, router)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

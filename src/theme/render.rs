//! Handlebars rendering for themes and views.
//!
//! # Responsibilities
//! - Compile every template of a theme into one registry, cached per theme
//! - Register `partials/` and `components/` files as partials
//! - Render pages, view artifacts and error pages with the site/route/user data
//!
//! # Design Decisions
//! - Registry keys are paths relative to the theme root, lowercased, with extension
//! - `partials/` wins over `components/` when both define a name
//! - The error page never fails: a minimal inline page is the last resort

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use dashmap::DashMap;
use handlebars::Handlebars;
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use crate::config::schema::ThemeConfig;
use crate::http::error::HttpError;
use crate::http::request::RequestContext;
use crate::http::response::html;
use crate::routing::meta_parser::strip_block;
use crate::services::OptionsStore;
use crate::theme::resolver::{find_entry, TemplateResolver, PARTIAL_DIRS, TEMPLATE_EXTENSIONS};

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("theme not found: {0}")]
    ThemeNotFound(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl From<ThemeError> for HttpError {
    fn from(err: ThemeError) -> Self {
        match err {
            ThemeError::TemplateNotFound(name) => HttpError::NotFound(format!("Template not found: {}", name)),
            other => HttpError::internal(other),
        }
    }
}

pub struct ThemeRenderer {
    resolver: TemplateResolver,
    active: String,
    options: Arc<dyn OptionsStore>,
    live: bool,
    registries: DashMap<String, Arc<Handlebars<'static>>>,
}

impl ThemeRenderer {
    pub fn new(config: &ThemeConfig, options: Arc<dyn OptionsStore>, live: bool) -> Self {
        Self {
            resolver: TemplateResolver::new(&config.dir, live),
            active: config.active.clone(),
            options,
            live,
            registries: DashMap::new(),
        }
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Compiled registry of a theme.
    pub fn registry(&self, theme: &str) -> Result<Arc<Handlebars<'static>>, ThemeError> {
        let key = theme.to_ascii_lowercase();
        if !self.live {
            if let Some(hit) = self.registries.get(&key) {
                return Ok(hit.clone());
            }
        }

        let registry = Arc::new(self.build_registry(theme)?);
        if !self.live {
            self.registries.insert(key, registry.clone());
        }
        Ok(registry)
    }

    fn build_registry(&self, theme: &str) -> Result<Handlebars<'static>, ThemeError> {
        let root = self
            .resolver
            .theme_dir(theme)
            .ok_or_else(|| ThemeError::ThemeNotFound(theme.to_string()))?;

        let mut hbs = Handlebars::new();
        for path in template_files(&root) {
            let source = fs::read_to_string(&path)?;
            hbs.register_template_string(&registry_name(&root, &path), source)?;
        }

        let mut partials = 0usize;
        for dir in PARTIAL_DIRS.iter().rev() {
            let Some(base) = find_entry(&root, dir).filter(|p| p.is_dir()) else {
                continue;
            };
            for path in template_files(&base) {
                let source = fs::read_to_string(&path)?;
                hbs.register_partial(&partial_name(&base, &path), source)?;
                partials += 1;
            }
        }

        tracing::debug!(
            theme = %theme,
            templates = hbs.get_templates().len(),
            partials,
            "Theme registry compiled"
        );
        Ok(hbs)
    }

    /// Shared `site` object from the options store.
    pub fn site_data(&self) -> Value {
        let option = |name: &str| self.options.get_str(name).map(Value::String).unwrap_or(Value::Null);
        json!({
            "title": option("title"),
            "description": option("description"),
            "url": option("url"),
            "theme": self.active,
        })
    }

    /// Render data for a request, with handler-specific values merged on top.
    pub fn page_data(&self, ctx: &RequestContext, extra: Value) -> Value {
        let mut data = Map::new();
        data.insert("site".into(), self.site_data());
        data.insert(
            "route".into(),
            json!({
                "path": ctx.path,
                "params": ctx.params,
                "query": ctx.query,
            }),
        );
        data.insert(
            "user".into(),
            ctx.user.as_ref().map(|u| json!(u.user_id)).unwrap_or(Value::Null),
        );
        if let Value::Object(extra) = extra {
            data.extend(extra);
        }
        Value::Object(data)
    }

    /// Render a logical template of the active theme (with `index` fallback).
    pub fn render_named(&self, name: &str, data: &Value) -> Result<String, ThemeError> {
        let path = self
            .resolver
            .resolve_template(&self.active, name)
            .ok_or_else(|| ThemeError::TemplateNotFound(name.to_string()))?;
        self.render_path(&path, data)
    }

    fn render_path(&self, path: &Path, data: &Value) -> Result<String, ThemeError> {
        let root = self
            .resolver
            .theme_dir(&self.active)
            .ok_or_else(|| ThemeError::ThemeNotFound(self.active.clone()))?;
        let registry = self.registry(&self.active)?;
        Ok(registry.render(&registry_name(&root, path), data)?)
    }

    /// Render a theme page as a 200 HTML response.
    pub fn render_page(&self, name: &str, ctx: &RequestContext, extra: Value) -> Result<Response, HttpError> {
        let data = self.page_data(ctx, extra);
        let body = self.render_named(name, &data)?;
        Ok(html(StatusCode::OK, body))
    }

    /// Render a view artifact. Its meta block is stripped from the output.
    pub async fn render_view(&self, path: &Path, ctx: &RequestContext) -> Result<Response, HttpError> {
        let source = tokio::fs::read_to_string(path).await?;
        let body = strip_block(&source);
        let data = self.page_data(ctx, Value::Null);

        let rendered = match self.registry(&self.active) {
            Ok(registry) => registry.render_template(&body, &data),
            Err(ThemeError::ThemeNotFound(_)) => Handlebars::new().render_template(&body, &data),
            Err(other) => return Err(other.into()),
        };
        let rendered = rendered.map_err(ThemeError::from)?;
        Ok(html(StatusCode::OK, rendered))
    }

    /// Error page for content routes. Never fails.
    pub fn render_error(&self, status: StatusCode, message: &str) -> Response {
        let data = json!({
            "site": self.site_data(),
            "code": status.as_u16(),
            "message": message,
        });

        let rendered = self
            .resolver
            .resolve_exact(&self.active, "error")
            .ok_or_else(|| ThemeError::TemplateNotFound("error".to_string()))
            .and_then(|path| self.render_path(&path, &data));

        let body = rendered.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Theme error page unavailable, using inline page");
            inline_error_page(status, message)
        });
        html(status, body)
    }

    pub fn clear(&self) {
        self.registries.clear();
        self.resolver.clear();
    }

    /// Number of memoized template lookups plus compiled registries.
    pub fn cached_len(&self) -> usize {
        self.resolver.cached_len() + self.registries.len()
    }
}

fn template_files(dir: &Path) -> impl Iterator<Item = std::path::PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEMPLATE_EXTENSIONS.iter().any(|t| e.eq_ignore_ascii_case(t)))
        })
}

fn relative_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .to_ascii_lowercase()
}

fn registry_name(root: &Path, path: &Path) -> String {
    relative_name(root, path)
}

fn partial_name(base: &Path, path: &Path) -> String {
    let name = relative_name(base, path);
    match name.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Minimal page used when the theme cannot render its own error template.
pub fn inline_error_page(status: StatusCode, message: &str) -> String {
    let code = status.as_u16();
    let message = handlebars::html_escape(message);
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{code} {message}</title></head>\
         <body><h1>{code}</h1><p>{message}</p></body></html>\n"
    )
}

use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use crate::http::handler::HandlerResult;
use crate::http::request::RequestContext;
use crate::http::response::ApiResponse;
use crate::routing::table::RouteKind;

#[derive(Serialize)]
pub struct SystemInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub theme: String,
}

#[derive(Serialize)]
pub struct RouteEntry {
    pub path: String,
    pub kind: RouteKind,
    pub handler: String,
    pub site: String,
}

#[derive(Serialize)]
pub struct CacheStats {
    pub match_memo: usize,
    pub meta_local: usize,
    pub templates: usize,
}

pub async fn system_info(ctx: RequestContext) -> HandlerResult {
    Ok(ApiResponse::ok(SystemInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        theme: ctx.app.theme.active().to_string(),
    })
    .into_response())
}

pub async fn client_ip(ctx: RequestContext) -> HandlerResult {
    Ok(ApiResponse::ok(json!({ "ip": ctx.client_ip() })).into_response())
}

/// Feature flags safe to show to anonymous callers.
pub async fn public_config(ctx: RequestContext) -> HandlerResult {
    let config = &ctx.app.config;
    Ok(ApiResponse::ok(json!({
        "path_prefix": config.routing.path_prefix,
        "auto_router": config.routing.auto_router,
        "cms_routes": config.theme.cms_routes,
        "asset_routes": config.theme.asset_routes,
        "token_required": config.token.enabled,
        "cache_enabled": config.cache.enabled,
        "live": config.debug.live,
    }))
    .into_response())
}

pub async fn list_routes(ctx: RequestContext) -> HandlerResult {
    let routes: Vec<RouteEntry> = ctx
        .app
        .table
        .list()
        .iter()
        .map(|route| RouteEntry {
            path: route.path().to_string(),
            kind: route.kind,
            handler: route.handler.key().to_string(),
            site: route.site.clone(),
        })
        .collect();
    Ok(ApiResponse::ok(routes).into_response())
}

pub async fn cache_stats(ctx: RequestContext) -> HandlerResult {
    let app = &ctx.app;
    Ok(ApiResponse::ok(CacheStats {
        match_memo: app.matcher.cached_len(),
        meta_local: app.resolver.cached_len(),
        templates: app.theme.cached_len(),
    })
    .into_response())
}

pub async fn clear_cache(ctx: RequestContext) -> HandlerResult {
    ctx.app.clear_caches();
    tracing::info!(request_id = %ctx.request_id, user = ?ctx.user.as_ref().map(|u| u.user_id), "Caches cleared on request");
    Ok(ApiResponse::with_message("Caches cleared", serde_json::Value::Null).into_response())
}

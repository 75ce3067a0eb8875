//! System routes: engine info, route listing and process-cache control.
//!
//! Registered like any other route, so the policy layer gates them through
//! their meta (`requireAdmin`, `method`).

pub mod handlers;

use crate::http::handler::{Handler, HandlerKey, RouteHandler};
use crate::routing::meta::{Gate, RouteMeta};
use crate::routing::resolver::MetaSource;
use crate::routing::table::{RegistrationError, RouteKind, RouteTable};
use self::handlers::*;

fn system_meta(method: &str, admin: bool) -> MetaSource {
    MetaSource::explicit(RouteMeta {
        method: Some(vec![method.to_string()]),
        token: Some(false),
        require_admin: if admin { Gate::On } else { Gate::Off },
        ..RouteMeta::default()
    })
}

fn system(name: &str, handler: impl RouteHandler) -> Handler {
    Handler::new(HandlerKey::new(format!("system:{}", name)), handler)
}

pub fn register_system_routes(table: &mut RouteTable) -> Result<usize, RegistrationError> {
    let kind = RouteKind::System;
    table.register("/system/info", system("info", system_info), system_meta("GET", false), kind)?;
    table.register("/system/client-ip", system("client-ip", client_ip), system_meta("GET", false), kind)?;
    table.register("/system/config", system("config", public_config), system_meta("GET", false), kind)?;
    table.register("/system/routes", system("routes", list_routes), system_meta("GET", true), kind)?;
    table.register("/system/cache", system("cache", cache_stats), system_meta("GET", true), kind)?;
    table.register("/system/cache/clear", system("cache-clear", clear_cache), system_meta("POST", true), kind)?;
    Ok(6)
}

//! Built-in CMS content routes rendered by the active theme.

use serde_json::json;

use crate::http::handler::{Handler, HandlerKey, RouteHandler};
use crate::http::request::RequestContext;
use crate::routing::meta::RouteMeta;
use crate::routing::resolver::MetaSource;
use crate::routing::table::{RegistrationError, RouteKind, RouteTable};

/// `(path, template)` pairs, in registration order.
pub const CMS_ROUTES: &[(&str, &str)] = &[
    ("/", "index"),
    ("/post/{id}", "post"),
    ("/page/{slug}", "page"),
    ("/category/{slug}", "category"),
    ("/category/{slug}/{page}", "category"),
    ("/tag/{slug}", "tag"),
    ("/tag/{slug}/{page}", "tag"),
    ("/user/{name}", "user"),
];

/// Handler rendering one theme template with the request's captures.
pub fn template_handler(template: &'static str) -> impl RouteHandler {
    move |ctx: RequestContext| async move {
        let extra = json!({ "template": template, "params": ctx.params });
        ctx.app.theme.render_page(template, &ctx, extra)
    }
}

fn page_meta() -> RouteMeta {
    RouteMeta {
        method: Some(vec!["GET".to_string(), "HEAD".to_string()]),
        token: Some(false),
        ..RouteMeta::default()
    }
}

/// Register the content routes. Paths already taken by views are left to them.
pub fn register_cms_routes(table: &mut RouteTable) -> Result<usize, RegistrationError> {
    let mut registered = 0;
    for &(path, template) in CMS_ROUTES {
        let handler = Handler::new(HandlerKey::new(format!("theme:{}", template)), template_handler(template));
        match table.register_at(
            path,
            handler,
            MetaSource::explicit(page_meta()),
            RouteKind::Theme,
            format!("cms route {}", template),
        ) {
            Ok(_) => registered += 1,
            Err(RegistrationError::Conflict { path, existing_handler, .. }) => {
                tracing::info!(path = %path, existing = %existing_handler, "Content route path taken, keeping existing route");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_content_routes() {
        let mut table = RouteTable::new();
        assert_eq!(register_cms_routes(&mut table).unwrap(), CMS_ROUTES.len());
        assert_eq!(table.get("/").unwrap().handler.key().as_str(), "theme:index");
        assert_eq!(table.parameterized().count(), CMS_ROUTES.len() - 1);
        assert!(table.list().iter().all(|r| r.kind == RouteKind::Theme));
    }

    #[test]
    fn existing_routes_take_precedence() {
        let mut table = RouteTable::new();
        let home = Handler::new(HandlerKey::new("view:index"), template_handler("index"));
        table.register_at("/", home, MetaSource::Default, RouteKind::View, "test").unwrap();

        assert_eq!(register_cms_routes(&mut table).unwrap(), CMS_ROUTES.len() - 1);
        assert_eq!(table.get("/").unwrap().handler.key().as_str(), "view:index");
    }

    #[test]
    fn page_meta_skips_token_and_limits_methods() {
        let meta = page_meta();
        assert_eq!(meta.token, Some(false));
        assert!(meta.allows_method("head"));
        assert!(!meta.allows_method("POST"));
    }
}

//! HTTP server setup and the engine entry point.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback that drives the engine
//! - Wire up middleware (tracing, timeout, body limit, request ID, hardening headers)
//! - Answer CORS preflight before routing
//! - Run match → meta → policy → dispatch for every request
//! - Serve plain TCP or TLS with graceful shutdown
//! - Observability (metrics, correlation IDs)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::TlsConfig;
use crate::http::context::AppContext;
use crate::http::dispatcher::{merge_headers, render_error};
use crate::http::error::HttpError;
use crate::http::request::{ensure_request_id, RequestContext};
use crate::observability::metrics;
use crate::routing::matcher::MatchResult;
use crate::routing::table::RouteKind;
use crate::security::policy::PolicyOutcome;

/// HTTP server for the routing engine.
pub struct HttpServer {
    router: Router,
    grace: Duration,
}

impl HttpServer {
    pub fn new(app: Arc<AppContext>) -> Self {
        let grace = Duration::from_secs(app.config.timeouts.shutdown_grace_secs);
        Self {
            router: Self::build_router(app),
            grace,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(app: Arc<AppContext>) -> Router {
        let request_timeout = Duration::from_secs(app.config.timeouts.request_secs);
        let body_limit = app.config.security.max_body_size;
        let hardening = app.config.security.enable_headers;

        let mut router = Router::new().fallback(engine_handler).with_state(app);

        if hardening {
            router = router
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ));
        }

        router
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS with rustls until the shutdown signal fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        let handle = axum_server::Handle::new();

        let signal = handle.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            signal.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Engine entry point: every request lands here.
async fn engine_handler(State(app): State<Arc<AppContext>>, mut request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = ensure_request_id(request.headers_mut());

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let path = app.matcher.normalize(target);

    if method == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        response.headers_mut().extend(app.policy.cors(request.headers()));
        metrics::record_request(method.as_str(), 200, "preflight", start);
        return response;
    }

    let matched = app.matcher.match_path(&path);
    let Some(route) = app.matcher.route(&matched) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        let kind = if app.config.theme.cms_routes { RouteKind::Theme } else { RouteKind::Api };
        let response = render_error(&app, kind, &HttpError::not_found());
        metrics::record_request(method.as_str(), 404, "none", start);
        return response;
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route.path(),
        handler = %route.handler.key(),
        "Route matched"
    );

    let captures = match matched {
        MatchResult::Param { captures, .. } => captures,
        _ => HashMap::new(),
    };
    let meta = app.resolver.resolve(&route.meta);

    let response = match RequestContext::from_request(app.clone(), request, path).await {
        Err(error) => render_error(&app, route.kind, &error),
        Ok(mut ctx) => match app.policy.enforce(&meta, &mut ctx) {
            PolicyOutcome::Continue(headers) => {
                app.dispatcher.dispatch(route, &meta, captures, ctx, headers).await
            }
            PolicyOutcome::ShortCircuit { error, headers } => {
                let mut response = render_error(&app, route.kind, &error);
                merge_headers(&mut response, &headers.headers, false);
                response
            }
        },
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), route.path(), start);
    response
}

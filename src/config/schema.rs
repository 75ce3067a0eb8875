//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files, and
//! every section carries defaults so a minimal (or empty) file is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the content router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request path normalization, auto router and route manifest.
    pub routing: RoutingConfig,

    /// Global response caching defaults and the persistent cache driver.
    pub cache: CacheConfig,

    /// Global API token requirement.
    pub token: TokenConfig,

    /// Static credentials backing the shipped authenticator.
    pub auth: AuthConfig,

    /// Theme location and content routes.
    pub theme: ThemeConfig,

    /// Static file, attachment and transcoding settings.
    pub delivery: DeliveryConfig,

    /// Live-debug switches.
    pub debug: DebugConfig,

    /// Security hardening configuration.
    pub security: SecurityConfig,

    /// Route middleware settings.
    pub middleware: MiddlewareConfig,

    /// Options store backing file.
    pub options: OptionsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Reverse-proxy path prefix stripped before matching (e.g. "/apiService").
    pub path_prefix: String,

    /// Query parameter that overrides the request path (e.g. `?s=/post/1`).
    pub query_path_param: Option<String>,

    /// Register every view under `views_dir` by its file path.
    pub auto_router: bool,

    /// Directory holding view artifacts.
    pub views_dir: String,

    /// Explicit route manifest.
    pub routes: Vec<RouteEntry>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/apiService".to_string(),
            query_path_param: Some("s".to_string()),
            auto_router: false,
            views_dir: "views".to_string(),
            routes: Vec::new(),
        }
    }
}

/// A manifest route: path to view artifact, with optional explicit meta.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Route path, may contain `{name}` segments.
    pub path: String,

    /// View artifact name relative to the views directory, without extension.
    pub view: String,

    /// Explicit route meta. When present the artifact's meta block is ignored.
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Persistent cache backend.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    #[default]
    Memory,
    File,
}

/// Global cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default `cache.enabled` for routes that declare none.
    pub enabled: bool,

    /// Default `cache.time` (seconds) for routes that declare none.
    pub time: u64,

    /// Path prefixes whose responses are never cached.
    pub exclude: Vec<String>,

    /// Persistent cache backend.
    pub driver: CacheDriver,

    /// Directory for the file driver.
    pub dir: String,

    /// TTL of persistent route-meta entries, in seconds.
    pub meta_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: 0,
            exclude: vec![
                "/auth/".to_string(),
                "/anon/debug/".to_string(),
                "/anon/install".to_string(),
            ],
            driver: CacheDriver::Memory,
            dir: "cache".to_string(),
            meta_ttl_secs: 86_400,
        }
    }
}

/// Global API token requirement.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TokenConfig {
    /// Require a token on every route that does not opt out.
    pub enabled: bool,

    /// Paths exempt from the global requirement.
    pub whitelist: Vec<String>,
}

/// A statically configured API token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiToken {
    pub token: String,
    pub user_id: u64,
    #[serde(default)]
    pub username: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session cookie name; its value must be one of the configured tokens.
    pub session_cookie: String,

    /// Accepted API tokens.
    pub tokens: Vec<ApiToken>,

    /// User ids carrying admin privilege.
    pub admins: Vec<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "session".to_string(),
            tokens: Vec::new(),
            admins: Vec::new(),
        }
    }
}

/// Theme configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Directory containing all themes.
    pub dir: String,

    /// Active theme name (matched case-insensitively).
    pub active: String,

    /// Register the built-in content routes (`/`, `/post/{id}`, ...).
    pub cms_routes: bool,

    /// Register the active theme's asset files.
    pub asset_routes: bool,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            dir: "themes".to_string(),
            active: "default".to_string(),
            cms_routes: true,
            asset_routes: true,
        }
    }
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Root of stored attachments (`<upload_dir>/<type>/<file>`).
    pub upload_dir: String,

    /// Cache TTL for theme assets, in seconds.
    pub static_ttl_secs: u64,

    /// Cache TTL for attachments, in seconds.
    pub attachment_ttl_secs: u64,

    /// Allow gzip for compressible static responses.
    pub compress: bool,

    /// Quality used by lossy image encoders.
    pub transcode_quality: u8,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            static_ttl_secs: 31_536_000,
            attachment_ttl_secs: 31_536_000,
            compress: true,
            transcode_quality: 85,
        }
    }
}

/// Debug configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Live mode: bypass every process cache and the persistent meta tier.
    pub live: bool,

    /// Expose internal error details in error envelopes.
    pub verbose_errors: bool,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Allowed CORS origins. Empty echoes the request origin.
    pub cors_origins: Vec<String>,

    /// Path prefix of debug endpoints that accept a logged-in session in place of a token.
    pub debug_api_prefix: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_origins: Vec::new(),
            debug_api_prefix: "/anon/debug/api/".to_string(),
        }
    }
}

/// Route middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Middleware run before every route's own list.
    pub global: Vec<String>,

    /// Settings of the built-in `rate_limit` middleware.
    pub rate_limit: RateLimitConfig,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
        }
    }
}

/// Options store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OptionsConfig {
    /// JSON object file. None keeps options in memory only.
    pub file: Option<String>,

    /// Reload the file when it changes on disk.
    pub watch: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (quality, rate limits)
//! - Check manifest routes (leading slash, duplicates)
//! - Check referenced files and middleware names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::http::middleware::BUILTIN_MIDDLEWARE;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        for (field, path) in [("listener.tls.cert_path", &tls.cert_path), ("listener.tls.key_path", &tls.key_path)] {
            if !Path::new(path).is_file() {
                errors.push(ValidationError::new(field, format!("file '{}' does not exist", path)));
            }
        }
    }

    if !config.routing.path_prefix.is_empty() && !config.routing.path_prefix.starts_with('/') {
        errors.push(ValidationError::new("routing.path_prefix", "must start with '/'"));
    }

    let mut seen = HashSet::new();
    for (i, route) in config.routing.routes.iter().enumerate() {
        let field = format!("routing.routes[{}]", i);
        if !route.path.starts_with('/') {
            errors.push(ValidationError::new(&field, format!("path '{}' must start with '/'", route.path)));
        }
        if !seen.insert(route.path.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate path '{}'", route.path)));
        }
        if route.view.trim().is_empty() {
            errors.push(ValidationError::new(&field, "view must not be empty"));
        }
        let names = route
            .meta
            .as_ref()
            .and_then(|m| m.get("middleware"))
            .and_then(|m| m.as_array());
        for name in names.into_iter().flatten().filter_map(|n| n.as_str()) {
            if !BUILTIN_MIDDLEWARE.contains(&name) {
                errors.push(ValidationError::new(&field, format!("unknown middleware '{}'", name)));
            }
        }
    }

    for prefix in &config.cache.exclude {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new("cache.exclude", format!("prefix '{}' must start with '/'", prefix)));
        }
    }

    if !(1..=100).contains(&config.delivery.transcode_quality) {
        errors.push(ValidationError::new("delivery.transcode_quality", "must be within 1..=100"));
    }

    let rate = &config.middleware.rate_limit;
    if rate.requests_per_second == 0 {
        errors.push(ValidationError::new("middleware.rate_limit.requests_per_second", "must be positive"));
    }
    if rate.burst_size == 0 {
        errors.push(ValidationError::new("middleware.rate_limit.burst_size", "must be positive"));
    }

    for name in &config.middleware.global {
        if !BUILTIN_MIDDLEWARE.contains(&name.as_str()) {
            errors.push(ValidationError::new("middleware.global", format!("unknown middleware '{}'", name)));
        }
    }

    if !config.security.debug_api_prefix.starts_with('/') {
        errors.push(ValidationError::new("security.debug_api_prefix", "must start with '/'"));
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "is not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteEntry;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.delivery.transcode_quality = 0;
        config.cache.exclude.push("auth".into());
        config.routing.routes.push(RouteEntry {
            path: "user".into(),
            view: "user/info".into(),
            meta: Some(serde_json::json!({ "middleware": ["missing"] })),
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"delivery.transcode_quality"));
        assert!(fields.contains(&"cache.exclude"));
        assert_eq!(fields.iter().filter(|f| **f == "routing.routes[0]").count(), 2);
    }

    #[test]
    fn duplicate_manifest_paths_rejected() {
        let mut config = AppConfig::default();
        for view in ["a", "b"] {
            config.routing.routes.push(RouteEntry {
                path: "/same".into(),
                view: view.into(),
                meta: None,
            });
        }
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("duplicate"));
    }

    #[test]
    fn empty_debug_api_prefix_rejected() {
        let mut config = AppConfig::default();
        config.security.debug_api_prefix = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "security.debug_api_prefix"));

        config.security.debug_api_prefix = "debug/".to_string();
        assert!(validate_config(&config).is_err());
    }
}

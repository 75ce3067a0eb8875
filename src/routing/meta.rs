//! Per-route policy metadata.
//!
//! # Responsibilities
//! - Typed `RouteMeta` with documented defaults
//! - Sanitize untrusted key/value trees (manifest tables, parsed meta blocks)
//!   against a fixed allow-list of keys and types
//! - Serialize back to the same key names for the persistent cache
//!
//! # Design Decisions
//! - Unknown keys are dropped, wrongly typed values keep the default
//! - `requireLogin` / `requireAdmin` accept a bool or a message string
//! - `cache` unset means "use the global cache defaults"

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// A bool-or-message gate (`requireLogin`, `requireAdmin`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gate {
    #[default]
    Off,
    On,
    /// Enabled, with a custom failure message.
    Message(String),
}

impl Gate {
    pub fn is_on(&self) -> bool {
        !matches!(self, Gate::Off)
    }

    /// The custom message, or `default` when none was given.
    pub fn message_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Gate::Message(m) => m,
            _ => default,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Gate::On),
            Value::Bool(false) | Value::Null => Some(Gate::Off),
            Value::String(s) if s.is_empty() => Some(Gate::Off),
            Value::String(s) => Some(Gate::Message(s.clone())),
            Value::Number(n) => Some(if n.as_f64().unwrap_or(0.0) != 0.0 { Gate::On } else { Gate::Off }),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Gate::Off => Value::Bool(false),
            Gate::On => Value::Bool(true),
            Gate::Message(m) => Value::String(m.clone()),
        }
    }
}

impl Serialize for Gate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Per-route cache directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheDirective {
    pub enabled: bool,
    /// Seconds.
    pub time: u64,
}

/// Policy metadata attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub header: bool,
    pub require_login: Gate,
    pub require_admin: Gate,
    /// Allowed methods, upper-cased. None allows any method.
    pub method: Option<Vec<String>>,
    pub cors: bool,
    pub response: bool,
    pub code: u16,
    /// Explicit token requirement. None defers to the global setting.
    pub token: Option<bool>,
    pub middleware: Vec<String>,
    pub cache: Option<CacheDirective>,
}

impl Default for RouteMeta {
    fn default() -> Self {
        Self {
            header: true,
            require_login: Gate::Off,
            require_admin: Gate::Off,
            method: None,
            cors: true,
            response: true,
            code: 200,
            token: None,
            middleware: Vec::new(),
            cache: None,
        }
    }
}

impl RouteMeta {
    /// Defaults for static assets and attachments.
    pub fn static_asset() -> Self {
        Self {
            header: false,
            method: Some(vec!["GET".to_string(), "HEAD".to_string()]),
            token: Some(false),
            ..Self::default()
        }
    }

    /// Merge an untrusted key/value tree onto the defaults.
    ///
    /// Anything that is not an object yields the defaults.
    pub fn sanitize(value: &Value) -> Self {
        let mut meta = Self::default();
        let Some(map) = value.as_object() else {
            return meta;
        };

        for (key, value) in map {
            match key.as_str() {
                "header" => set_bool(&mut meta.header, value),
                "cors" => set_bool(&mut meta.cors, value),
                "response" => set_bool(&mut meta.response, value),
                "requireLogin" => {
                    if let Some(gate) = Gate::from_value(value) {
                        meta.require_login = gate;
                    }
                }
                "requireAdmin" => {
                    if let Some(gate) = Gate::from_value(value) {
                        meta.require_admin = gate;
                    }
                }
                "method" => meta.method = sanitize_methods(value),
                "code" => {
                    if let Some(code) = value.as_u64().filter(|c| (100..=599).contains(c)) {
                        meta.code = code as u16;
                    }
                }
                "token" => match value {
                    Value::Bool(b) => meta.token = Some(*b),
                    Value::Null => meta.token = None,
                    _ => {}
                },
                "middleware" => meta.middleware = sanitize_names(value),
                "cache" => meta.cache = sanitize_cache(value),
                other => tracing::debug!(key = other, "Dropping unknown route meta key"),
            }
        }
        meta
    }

    /// Key/value form using the declared key names.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("header".into(), json!(self.header));
        map.insert("requireLogin".into(), self.require_login.to_value());
        map.insert("requireAdmin".into(), self.require_admin.to_value());
        map.insert("method".into(), json!(self.method));
        map.insert("cors".into(), json!(self.cors));
        map.insert("response".into(), json!(self.response));
        map.insert("code".into(), json!(self.code));
        map.insert("token".into(), json!(self.token));
        map.insert("middleware".into(), json!(self.middleware));
        if let Some(cache) = self.cache {
            map.insert("cache".into(), json!({ "enabled": cache.enabled, "time": cache.time }));
        }
        Value::Object(map)
    }

    /// Whether `method` passes the allow-list (case-insensitive).
    pub fn allows_method(&self, method: &str) -> bool {
        match &self.method {
            None => true,
            Some(allowed) => allowed.iter().any(|m| m.eq_ignore_ascii_case(method)),
        }
    }
}

fn set_bool(slot: &mut bool, value: &Value) {
    if let Some(b) = value.as_bool() {
        *slot = b;
    }
}

fn sanitize_methods(value: &Value) -> Option<Vec<String>> {
    let methods: Vec<String> = match value {
        Value::String(s) => s
            .split(',')
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|m| m.as_str())
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect(),
        _ => return None,
    };
    (!methods.is_empty()).then_some(methods)
}

fn sanitize_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn sanitize_cache(value: &Value) -> Option<CacheDirective> {
    let map = value.as_object()?;
    let mut directive = CacheDirective { enabled: false, time: 0 };
    if let Some(enabled) = map.get("enabled").and_then(Value::as_bool) {
        directive.enabled = enabled;
    }
    if let Some(time) = map.get("time").and_then(Value::as_u64) {
        directive.time = time;
    }
    Some(directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let meta = RouteMeta::default();
        assert!(meta.header && meta.cors && meta.response);
        assert_eq!(meta.code, 200);
        assert!(meta.token.is_none());
        assert!(meta.cache.is_none());
        assert!(meta.allows_method("DELETE"));
    }

    #[test]
    fn sanitize_keeps_allow_listed_keys() {
        let meta = RouteMeta::sanitize(&json!({
            "requireLogin": "Please sign in",
            "requireAdmin": true,
            "method": ["get", "Post"],
            "code": 201,
            "token": false,
            "middleware": ["rate_limit"],
            "cache": { "enabled": true, "time": 300, "extra": 1 },
            "callback": "system('rm -rf /')",
        }));

        assert_eq!(meta.require_login, Gate::Message("Please sign in".into()));
        assert_eq!(meta.require_admin, Gate::On);
        assert_eq!(meta.method, Some(vec!["GET".into(), "POST".into()]));
        assert_eq!(meta.code, 201);
        assert_eq!(meta.token, Some(false));
        assert_eq!(meta.middleware, ["rate_limit"]);
        assert_eq!(meta.cache, Some(CacheDirective { enabled: true, time: 300 }));
        assert!(meta.to_value().get("callback").is_none());
    }

    #[test]
    fn wrong_types_keep_defaults() {
        let meta = RouteMeta::sanitize(&json!({
            "header": "yes",
            "code": "teapot",
            "token": "maybe",
            "cache": { "enabled": "sure", "time": -5 },
        }));
        assert!(meta.header);
        assert_eq!(meta.code, 200);
        assert!(meta.token.is_none());
        assert_eq!(meta.cache, Some(CacheDirective { enabled: false, time: 0 }));
    }

    #[test]
    fn non_object_yields_defaults() {
        assert_eq!(RouteMeta::sanitize(&json!([1, 2, 3])), RouteMeta::default());
    }

    #[test]
    fn method_string_form() {
        let meta = RouteMeta::sanitize(&json!({ "method": "GET, put" }));
        assert!(meta.allows_method("put"));
        assert!(!meta.allows_method("DELETE"));
    }

    #[test]
    fn value_form_sanitizes_back_to_itself() {
        let meta = RouteMeta::sanitize(&json!({
            "requireLogin": "msg",
            "method": "POST",
            "cache": { "enabled": true, "time": 10 },
        }));
        assert_eq!(RouteMeta::sanitize(&meta.to_value()), meta);
    }
}

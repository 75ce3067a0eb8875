//! Route path patterns.
//!
//! # Responsibilities
//! - Normalize a route path (leading `/`)
//! - Compile `{name}` segments into an anchored expression
//! - Extract captures by name
//!
//! # Design Decisions
//! - Literal text is escaped before tokens are substituted, so `.` or `+`
//!   in a route path match themselves
//! - A token matches one non-empty path segment (`[^/]+`)
//! - Regex is only built for parameterized patterns; exact routes never
//!   touch it

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::routing::table::RegistrationError;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static token regex"))
}

/// Ensure a path starts with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Option<Regex>,
    names: Vec<String>,
}

impl RoutePattern {
    /// Compile a route path. Paths without tokens compile to an exact pattern.
    pub fn parse(path: &str) -> Result<Self, RegistrationError> {
        let raw = normalize_path(path);
        let tokens = token_regex();

        if !tokens.is_match(&raw) {
            return Ok(Self { raw, regex: None, names: Vec::new() });
        }

        let mut names: Vec<String> = Vec::new();
        let mut expr = String::from("^");
        let mut last = 0;
        for caps in tokens.captures_iter(&raw) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if names.iter().any(|n| n == name.as_str()) {
                return Err(RegistrationError::InvalidPattern {
                    pattern: raw.clone(),
                    reason: format!("duplicate parameter '{}'", name.as_str()),
                });
            }
            expr.push_str(&regex::escape(&raw[last..whole.start()]));
            expr.push_str("([^/]+)");
            names.push(name.as_str().to_string());
            last = whole.end();
        }
        expr.push_str(&regex::escape(&raw[last..]));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| RegistrationError::InvalidPattern {
            pattern: raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { raw, regex: Some(regex), names })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_parameterized(&self) -> bool {
        self.regex.is_some()
    }

    /// Parameter names, left to right.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Match a normalized request path, returning captures by name.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let regex = self.regex.as_ref()?;
        let caps = regex.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| caps.get(i + 1).map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_pattern_has_no_regex() {
        let pattern = RoutePattern::parse("post/list").unwrap();
        assert_eq!(pattern.as_str(), "/post/list");
        assert!(!pattern.is_parameterized());
        assert!(pattern.captures("/post/list").is_none());
    }

    #[test]
    fn multiple_tokens_left_to_right() {
        let pattern = RoutePattern::parse("/category/{slug}/{page}").unwrap();
        assert_eq!(pattern.names(), ["slug", "page"]);
        let caps = pattern.captures("/category/rust/3").unwrap();
        assert_eq!(caps["slug"], "rust");
        assert_eq!(caps["page"], "3");
        assert!(pattern.captures("/category/rust").is_none());
        assert!(pattern.captures("/category/rust/3/extra").is_none());
    }

    #[test]
    fn literal_metacharacters_are_escaped() {
        let pattern = RoutePattern::parse("/files/v1.0/{name}").unwrap();
        assert!(pattern.captures("/files/v1.0/readme").is_some());
        assert!(pattern.captures("/files/v1x0/readme").is_none());

        let pattern = RoutePattern::parse("/a+b/{id}").unwrap();
        assert!(pattern.captures("/a+b/7").is_some());
        assert!(pattern.captures("/aab/7").is_none());
    }

    #[test]
    fn token_never_spans_slashes() {
        let pattern = RoutePattern::parse("/post/{id}").unwrap();
        assert!(pattern.captures("/post/1/2").is_none());
        assert!(pattern.captures("/post/").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = RoutePattern::parse("/{id}/{id}").unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    proptest! {
        #[test]
        fn substituted_segments_are_captured(
            a in "[A-Za-z0-9._~-]{1,16}",
            b in "[^/?#\\s]{1,16}",
        ) {
            let pattern = RoutePattern::parse("/shop/{category}/item-{id}.html").unwrap();
            let path = format!("/shop/{}/item-{}.html", a, b);
            let caps = pattern.captures(&path).unwrap();
            prop_assert_eq!(&caps["category"], &a);
            prop_assert_eq!(&caps["id"], &b);
        }
    }
}

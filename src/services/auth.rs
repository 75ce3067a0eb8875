//! Authentication collaborator.
//!
//! The engine never issues tokens or sessions. It only asks three questions:
//! is this token valid (and for whom), who does this session belong to, and
//! is this user an admin.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use serde::Serialize;

use crate::config::schema::AuthConfig;

/// Identity established by a verified token or session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub user_id: u64,
    pub username: String,
}

pub trait Authenticator: Send + Sync {
    /// Verify an API token and return its claims.
    fn verify_token(&self, token: &str) -> Option<Claims>;

    /// Resolve the session carried by the request headers, if any.
    fn session_user(&self, headers: &HeaderMap) -> Option<Claims>;

    /// Check admin privilege for a user id.
    fn is_admin(&self, user_id: u64) -> bool;

    fn is_logged_in(&self, headers: &HeaderMap) -> bool {
        self.session_user(headers).is_some()
    }
}

/// Authenticator backed by statically configured tokens.
///
/// A session is a cookie whose value is one of the configured tokens.
pub struct ConfigAuthenticator {
    tokens: HashMap<String, Claims>,
    admins: Vec<u64>,
    session_cookie: String,
}

impl ConfigAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Claims {
                        user_id: t.user_id,
                        username: t.username.clone(),
                    },
                )
            })
            .collect();

        Self {
            tokens,
            admins: config.admins.clone(),
            session_cookie: config.session_cookie.clone(),
        }
    }

    fn cookie_value<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.session_cookie)
            .map(|(_, value)| value)
    }
}

impl Authenticator for ConfigAuthenticator {
    fn verify_token(&self, token: &str) -> Option<Claims> {
        if token.is_empty() {
            return None;
        }
        self.tokens.get(token).cloned()
    }

    fn session_user(&self, headers: &HeaderMap) -> Option<Claims> {
        self.cookie_value(headers).and_then(|v| self.verify_token(v))
    }

    fn is_admin(&self, user_id: u64) -> bool {
        self.admins.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiToken;

    fn authenticator() -> ConfigAuthenticator {
        ConfigAuthenticator::new(&AuthConfig {
            session_cookie: "sid".into(),
            tokens: vec![
                ApiToken { token: "alice-token".into(), user_id: 1, username: "alice".into() },
                ApiToken { token: "bob-token".into(), user_id: 2, username: "bob".into() },
            ],
            admins: vec![1],
        })
    }

    #[test]
    fn verifies_known_tokens_only() {
        let auth = authenticator();
        assert_eq!(auth.verify_token("bob-token").unwrap().user_id, 2);
        assert!(auth.verify_token("mallory").is_none());
        assert!(auth.verify_token("").is_none());
    }

    #[test]
    fn session_from_cookie() {
        let auth = authenticator();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; sid=alice-token".parse().unwrap());
        let user = auth.session_user(&headers).unwrap();
        assert_eq!(user.username, "alice");
        assert!(auth.is_logged_in(&headers));
        assert!(auth.is_admin(user.user_id));
        assert!(!auth.is_admin(2));
    }

    #[test]
    fn no_cookie_no_session() {
        let auth = authenticator();
        assert!(!auth.is_logged_in(&HeaderMap::new()));
    }
}

//! Request-time error taxonomy.
//!
//! Every failure path answers with the envelope `{code, message, data}`
//! (or an HTML page on content routes, see the dispatcher). `Internal`
//! details only reach the client when verbose errors are enabled.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::http::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method {received} not allowed")]
    MethodNotAllowed { allowed: Vec<String>, received: String },

    #[error("{message}")]
    Validation { message: String, data: Value },

    #[error("{message}")]
    TooManyRequests {
        message: String,
        limit: u32,
        retry_after_secs: u64,
    },

    /// Framework error carrying its own status and data.
    #[error("{message}")]
    Status {
        code: StatusCode,
        message: String,
        data: Value,
    },

    /// 500 with a message that is safe to show.
    #[error("{0}")]
    Server(String),

    /// Any other error. Details are withheld unless verbose errors are on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        HttpError::Internal(err.to_string())
    }

    pub fn not_found() -> Self {
        HttpError::NotFound("Not Found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            HttpError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            HttpError::Status { code, .. } => *code,
            HttpError::Server(_) | HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message.
    pub fn public_message(&self, verbose: bool) -> String {
        match self {
            HttpError::Internal(detail) if verbose => detail.clone(),
            HttpError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    /// Client-facing data.
    pub fn data(&self, verbose: bool) -> Value {
        match self {
            HttpError::MethodNotAllowed { allowed, received } => {
                json!({ "allowed": allowed, "received": received })
            }
            HttpError::Validation { data, .. } | HttpError::Status { data, .. } => data.clone(),
            HttpError::TooManyRequests { limit, retry_after_secs, .. } => {
                json!({ "limit": limit, "retry_after": retry_after_secs })
            }
            HttpError::Internal(detail) if verbose => json!({ "error": detail }),
            _ => Value::Null,
        }
    }

    /// JSON envelope response.
    pub fn to_response(&self, verbose: bool) -> Response {
        let mut response = ApiResponse::error(self.status(), self.public_message(verbose), self.data(verbose))
            .into_response();
        self.decorate(&mut response);
        response
    }

    /// Add protocol headers implied by the error (Allow, Retry-After, ...).
    pub fn decorate(&self, response: &mut Response) {
        let headers = response.headers_mut();
        match self {
            HttpError::MethodNotAllowed { allowed, .. } => {
                if let Ok(v) = allowed.join(", ").parse() {
                    headers.insert("allow", v);
                }
            }
            HttpError::TooManyRequests { limit, retry_after_secs, .. } => {
                headers.insert("x-ratelimit-limit", (*limit).into());
                headers.insert("x-ratelimit-remaining", 0u32.into());
                headers.insert("retry-after", (*retry_after_secs).into());
            }
            _ => {}
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => HttpError::not_found(),
            _ => HttpError::internal(err),
        }
    }
}

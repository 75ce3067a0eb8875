//! Response envelope.
//!
//! # Responsibilities
//! - The `{code, message, data}` JSON envelope shared by API and error responses
//! - Small helpers for HTML and raw byte responses
//!
//! # Design Decisions
//! - `code` mirrors the HTTP status so clients can read either
//! - A handler's returned `Response` is terminal: nothing is written after it

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// The JSON envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub message: String,
    pub data: Value,
}

impl ApiResponse {
    pub fn ok(data: impl Serialize) -> Self {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        let body = serde_json::to_vec(&self).unwrap_or_default();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }
}

/// An HTML response.
pub fn html(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

//! Error types for binding and request handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failure to attach a robot to a host application.
///
/// All variants are raised before any route is registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("{0} is not a valid WeChat Token.")]
    InvalidToken(String),

    #[error("invalid URL rule {rule:?}: {reason}")]
    InvalidRule { rule: String, reason: &'static str },

    #[error("endpoint {endpoint:?} is already registered at {rule}")]
    EndpointExists { endpoint: String, rule: String },

    #[error("URL rule {rule} is already served by endpoint {endpoint:?}")]
    RuleExists { rule: String, endpoint: String },

    #[error("request method {0} cannot be routed")]
    UnsupportedMethod(String),
}

/// Failure to decode a WeChat message body.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("message body is empty")]
    Empty,

    #[error("message body is not valid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("message body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("element {0} is never closed")]
    Unclosed(String),

    #[error("message is missing the {0} element")]
    MissingField(&'static str),

    #[error("element {field} has invalid value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Failure while serving a webhook request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to parse message: {0}")]
    Parse(#[from] ParseError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        error!(error = %self, "werobot_request_failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

//! Response fields filled in by a body handler.
//!
//! A connection answers exactly one request, so the response is a plain value:
//! a status code, the body bytes and the content type. The wire encoding lives in
//! [`crate::codec`].

use bytes::Bytes;
use http::StatusCode;
use mime::Mime;
use serde::Serialize;
use tracing::error;

/// The response a connection will write once the request message is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    body: Bytes,
    content_type: Option<Mime>,
}

impl Default for Response {
    fn default() -> Self {
        Self { status: StatusCode::OK, body: Bytes::new(), content_type: None }
    }
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>, content_type: Option<Mime>) -> Self {
        Self { status, body: body.into(), content_type }
    }

    /// Serializes `value` as a compact JSON body with an `application/json` content type.
    ///
    /// Response shapes are plain structs of strings and JSON values, so serialization
    /// can only fail on a broken `Serialize` impl; that case is logged and answered
    /// with an empty 400.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status, body, Some(mime::APPLICATION_JSON)),
            Err(e) => {
                error!(cause = %e, "failed to serialize response body");
                Self::new(StatusCode::BAD_REQUEST, Bytes::new(), Some(mime::APPLICATION_JSON))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// Body interpreted as UTF-8, mostly useful for logging and tests.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// `{"status":"ok","message":...}` sent when a handler received no body.
#[derive(Debug, Serialize)]
pub struct MessageBody<'a> {
    pub status: &'static str,
    pub message: &'a str,
}

impl<'a> MessageBody<'a> {
    pub fn ok(message: &'a str) -> Self {
        Self { status: "ok", message }
    }
}

/// `{"error":...,"status":"error"}` sent for every handler-level failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub status: &'static str,
}

impl<'a> ErrorBody<'a> {
    pub fn new(error: &'a str) -> Self {
        Self { error, status: "error" }
    }
}

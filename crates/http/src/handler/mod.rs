//! Body handler contract
//!
//! A [`BodyHandler`] owns the request body of every connection it is attached to.
//! The connection drives it through four phases:
//!
//! 1. [`init`](BodyHandler::init) once the headers are complete, with the declared
//!    content type. A handler that does not accept the content type attaches no
//!    context and stays inert for the rest of the request
//! 2. [`data`](BodyHandler::data) for every body chunk, while a context is attached
//!    and no earlier chunk failed
//! 3. [`complete`](BodyHandler::complete) exactly once, after the last chunk; it
//!    fills in the response
//! 4. [`cleanup`](BodyHandler::cleanup) when the connection is torn down, whether
//!    or not the earlier phases ran
//!
//! Handlers are stateless values shared by all connections; per-request state lives
//! in the [`HandlerContext`] of the connection's [`Exchange`].

mod buffer;
mod form;
mod json;
mod json_tokener;

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::{HandlerError, Response};

pub use buffer::{GrowableBuffer, INITIAL_BUFFER_SIZE};
pub use form::{FORM_CONTENT_TYPE, FormContext, FormFieldList, FormHandler, MAX_FORM_BODY_SIZE, url_decode};
pub use json::{JSON_CONTENT_TYPE, JsonBufferHandler, JsonStreamContext, JsonStreamHandler, MAX_JSON_BODY_SIZE};
pub use json_tokener::{DEFAULT_MAX_DEPTH, JsonTokener, TokenerError};

pub trait BodyHandler: Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decides whether to take the body, attaching a context if it does.
    ///
    /// An error means the handler wanted the body but could not set itself up;
    /// the connection then treats the body as not applicable.
    fn init(&self, exchange: &mut Exchange, content_type: Option<&str>) -> Result<(), HandlerError>;

    /// Consumes one body chunk. An error marks the request as failed.
    fn data(&self, exchange: &mut Exchange, chunk: &[u8]) -> Result<(), HandlerError>;

    /// Fills in the response once the whole body has been seen.
    fn complete(&self, exchange: &mut Exchange) -> Result<(), HandlerError>;

    /// Releases the per-request state. Safe to call any number of times.
    fn cleanup(&self, exchange: &mut Exchange) {
        exchange.take_context();
    }
}

/// Per-request state of a body handler.
#[derive(Debug, Default)]
pub enum HandlerContext {
    #[default]
    None,
    JsonStream(JsonStreamContext),
    Buffered(GrowableBuffer),
    Form(FormContext),
}

/// What a body handler sees of its connection.
#[derive(Debug, Default)]
pub struct Exchange {
    context: HandlerContext,
    parse_error: bool,
    response: Response,
}

impl Exchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut HandlerContext {
        &mut self.context
    }

    pub fn has_context(&self) -> bool {
        !matches!(self.context, HandlerContext::None)
    }

    pub fn set_context(&mut self, context: HandlerContext) {
        self.context = context;
    }

    /// Detaches the context, leaving [`HandlerContext::None`] behind.
    pub fn take_context(&mut self) -> HandlerContext {
        std::mem::take(&mut self.context)
    }

    pub fn parse_error(&self) -> bool {
        self.parse_error
    }

    pub fn set_parse_error(&mut self) {
        self.parse_error = true;
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }
}

/// The body handler a server runs with, picked once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerMode {
    #[default]
    JsonStream,
    JsonBuffer,
    Form,
}

impl HandlerMode {
    pub fn handler(self) -> Arc<dyn BodyHandler> {
        match self {
            HandlerMode::JsonStream => Arc::new(JsonStreamHandler),
            HandlerMode::JsonBuffer => Arc::new(JsonBufferHandler),
            HandlerMode::Form => Arc::new(FormHandler),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerMode::JsonStream => "json-stream",
            HandlerMode::JsonBuffer => "json-buffer",
            HandlerMode::Form => "form",
        }
    }
}

impl Display for HandlerMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown handler mode `{0}`, expected json-stream, json-buffer or form")]
pub struct UnknownMode(String);

impl FromStr for HandlerMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json-stream" => Ok(HandlerMode::JsonStream),
            "json-buffer" => Ok(HandlerMode::JsonBuffer),
            "form" => Ok(HandlerMode::Form),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

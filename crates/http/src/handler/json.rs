//! JSON body handlers
//!
//! Both handlers take a body whose content type contains `application/json` and
//! answer with `{"status":"ok","mode":...}`, echoing the `data` member of a
//! top-level object when there is one.
//!
//! - [`JsonStreamHandler`] feeds every chunk straight into a [`JsonTokener`]
//! - [`JsonBufferHandler`] collects the body in a [`GrowableBuffer`] of at most
//!   [`MAX_JSON_BODY_SIZE`] bytes and parses it on completion

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::handler::buffer::{GrowableBuffer, INITIAL_BUFFER_SIZE};
use crate::handler::json_tokener::JsonTokener;
use crate::handler::{BodyHandler, Exchange, HandlerContext};
use crate::protocol::{ErrorBody, HandlerError, MessageBody, Response};

pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const MAX_JSON_BODY_SIZE: usize = 10 * 1024 * 1024;

const STREAM_DEFAULT_MESSAGE: &str = "HTTP JSON Server (stream)";
const BUFFER_DEFAULT_MESSAGE: &str = "HTTP JSON Server (buffer)";

fn accepts(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|content_type| content_type.contains(JSON_CONTENT_TYPE))
}

#[derive(Debug, Serialize)]
struct EchoBody<'a> {
    status: &'static str,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<&'a Value>,
}

impl<'a> EchoBody<'a> {
    fn new(mode: &'static str, parsed: &'a Value) -> Self {
        Self { status: "ok", mode, echo: parsed.get("data") }
    }
}

#[derive(Debug, Default)]
pub struct JsonStreamContext {
    tokener: JsonTokener,
    parsed: Option<Value>,
}

impl JsonStreamContext {
    pub fn parsed(&self) -> Option<&Value> {
        self.parsed.as_ref()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStreamHandler;

impl BodyHandler for JsonStreamHandler {
    fn name(&self) -> &'static str {
        "json-stream"
    }

    fn init(&self, exchange: &mut Exchange, content_type: Option<&str>) -> Result<(), HandlerError> {
        if accepts(content_type) {
            exchange.set_context(HandlerContext::JsonStream(JsonStreamContext::default()));
        }
        Ok(())
    }

    fn data(&self, exchange: &mut Exchange, chunk: &[u8]) -> Result<(), HandlerError> {
        if exchange.parse_error() {
            return Ok(());
        }

        let HandlerContext::JsonStream(context) = exchange.context_mut() else {
            return Ok(());
        };

        if let Err(e) = context.tokener.feed(chunk) {
            warn!(cause = %e, "invalid json body");
            exchange.set_parse_error();
        }
        Ok(())
    }

    fn complete(&self, exchange: &mut Exchange) -> Result<(), HandlerError> {
        if !exchange.parse_error()
            && let HandlerContext::JsonStream(context) = exchange.context_mut()
        {
            match context.tokener.finish() {
                Ok(parsed) => context.parsed = parsed,
                Err(e) => {
                    warn!(cause = %e, "invalid json body");
                    exchange.set_parse_error();
                }
            }
        }

        let response = if exchange.parse_error() {
            Response::json(StatusCode::BAD_REQUEST, &ErrorBody::new("Invalid JSON"))
        } else if let HandlerContext::JsonStream(JsonStreamContext { parsed: Some(parsed), .. }) = exchange.context() {
            Response::json(StatusCode::OK, &EchoBody::new("stream", parsed))
        } else {
            Response::json(StatusCode::OK, &MessageBody::ok(STREAM_DEFAULT_MESSAGE))
        };

        exchange.set_response(response);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBufferHandler;

impl BodyHandler for JsonBufferHandler {
    fn name(&self) -> &'static str {
        "json-buffer"
    }

    fn init(&self, exchange: &mut Exchange, content_type: Option<&str>) -> Result<(), HandlerError> {
        if accepts(content_type) {
            let buffer = GrowableBuffer::with_limits(INITIAL_BUFFER_SIZE, MAX_JSON_BODY_SIZE)?;
            exchange.set_context(HandlerContext::Buffered(buffer));
        }
        Ok(())
    }

    fn data(&self, exchange: &mut Exchange, chunk: &[u8]) -> Result<(), HandlerError> {
        if exchange.parse_error() {
            return Ok(());
        }

        match exchange.context_mut() {
            HandlerContext::Buffered(buffer) => buffer.append(chunk),
            _ => Ok(()),
        }
    }

    fn complete(&self, exchange: &mut Exchange) -> Result<(), HandlerError> {
        let response = if exchange.parse_error() {
            Response::json(StatusCode::BAD_REQUEST, &ErrorBody::new("Invalid JSON or body too large"))
        } else {
            match exchange.context() {
                HandlerContext::Buffered(buffer) if !buffer.is_empty() => {
                    debug!(len = buffer.len(), "parsing buffered json body");
                    match serde_json::from_slice::<Value>(buffer.as_slice()) {
                        Ok(parsed) => Response::json(StatusCode::OK, &EchoBody::new("buffer", &parsed)),
                        Err(e) => {
                            warn!(cause = %e, "invalid json body");
                            Response::json(StatusCode::BAD_REQUEST, &ErrorBody::new("Invalid JSON"))
                        }
                    }
                }
                _ => Response::json(StatusCode::OK, &MessageBody::ok(BUFFER_DEFAULT_MESSAGE)),
            }
        };

        exchange.set_response(response);
        Ok(())
    }
}

//! `application/x-www-form-urlencoded` body handler
//!
//! The body is buffered (at most [`MAX_FORM_BODY_SIZE`] bytes) and parsed into a
//! [`FormFieldList`] on completion. The response lists the fields as a JSON object:
//!
//! ```text
//! name=John&age=30  =>  {"status":"ok","type":"form-urlencoded","fields":{"age":"30","name":"John"}}
//! ```
//!
//! Fields come out in reverse order of appearance.

use std::collections::VecDeque;

use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::handler::buffer::{GrowableBuffer, INITIAL_BUFFER_SIZE};
use crate::handler::{BodyHandler, Exchange, HandlerContext};
use crate::protocol::{ErrorBody, HandlerError, MessageBody, Response};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub const MAX_FORM_BODY_SIZE: usize = 1024 * 1024;

const DEFAULT_MESSAGE: &str = "HTTP Form Server";

/// Decoded `(name, value)` pairs, the last parsed pair first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldList {
    fields: VecDeque<(String, String)>,
}

impl FormFieldList {
    /// Parses an urlencoded body.
    ///
    /// The body is split on `&` and every segment is split on its first `=`. The
    /// scan stops at the first segment without `=`.
    pub fn parse(body: &[u8]) -> Self {
        let mut list = Self::default();
        for segment in body.split(|b| *b == b'&') {
            let Some(eq) = segment.iter().position(|b| *b == b'=') else {
                break;
            };
            list.push_front(url_decode(&segment[..eq]), url_decode(&segment[eq + 1..]));
        }
        list
    }

    pub fn push_front(&mut self, name: String, value: String) {
        self.fields.push_front((name, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields as a JSON object in list order.
    ///
    /// A repeated name keeps the position of its first entry and the value of its
    /// last one.
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (name, value) in self.iter() {
            map.insert(name.to_owned(), Value::String(value.to_owned()));
        }
        map
    }
}

/// Decodes `%XX` escapes and `+`, then converts to UTF-8 replacing invalid sequences.
///
/// An escape is only decoded when two characters follow the `%`; non-hex digits in
/// it count as zero.
pub fn url_decode(input: &[u8]) -> String {
    let mut decoded = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'%' if i + 2 < input.len() => {
                decoded.push((hex_value(input[i + 1]) << 4) | hex_value(input[i + 2]));
                i += 3;
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

#[derive(Debug)]
pub struct FormContext {
    buffer: GrowableBuffer,
    fields: FormFieldList,
}

impl FormContext {
    pub fn fields(&self) -> &FormFieldList {
        &self.fields
    }
}

#[derive(Debug, Serialize)]
struct FormBody {
    status: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormHandler;

impl BodyHandler for FormHandler {
    fn name(&self) -> &'static str {
        "form"
    }

    fn init(&self, exchange: &mut Exchange, content_type: Option<&str>) -> Result<(), HandlerError> {
        if content_type.is_some_and(|content_type| content_type.contains(FORM_CONTENT_TYPE)) {
            let buffer = GrowableBuffer::with_limits(INITIAL_BUFFER_SIZE, MAX_FORM_BODY_SIZE)?;
            exchange.set_context(HandlerContext::Form(FormContext { buffer, fields: FormFieldList::default() }));
        }
        Ok(())
    }

    fn data(&self, exchange: &mut Exchange, chunk: &[u8]) -> Result<(), HandlerError> {
        if exchange.parse_error() {
            return Ok(());
        }

        match exchange.context_mut() {
            HandlerContext::Form(form) => form.buffer.append(chunk),
            _ => Ok(()),
        }
    }

    fn complete(&self, exchange: &mut Exchange) -> Result<(), HandlerError> {
        let response = if exchange.parse_error() {
            Response::json(StatusCode::BAD_REQUEST, &ErrorBody::new("Form body too large"))
        } else {
            match exchange.context_mut() {
                HandlerContext::Form(form) if !form.buffer.is_empty() => {
                    form.fields = FormFieldList::parse(form.buffer.as_slice());
                    debug!(fields = form.fields.len(), "parsed form body");
                    let body = FormBody { status: "ok", kind: "form-urlencoded", fields: form.fields.to_json_map() };
                    Response::json(StatusCode::OK, &body)
                }
                _ => Response::json(StatusCode::OK, &MessageBody::ok(DEFAULT_MESSAGE)),
            }
        };

        exchange.set_response(response);
        Ok(())
    }
}

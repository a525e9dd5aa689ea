//! Per-connection request state
//!
//! [`ConnectionState`] receives the tokenizer callbacks of one connection and
//! routes them to the active [`BodyHandler`]. It tracks the declared content
//! type, the lifecycle [`Phase`] and the [`Exchange`] the handler writes its
//! response into.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use tracing::{debug, error, warn};

use crate::codec::ParseCallbacks;
use crate::handler::{BodyHandler, Exchange};
use crate::protocol::{ErrorBody, Response};

/// Lifecycle of a connection, in the order it moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Accepted,
    ParsingHeaders,
    BodyActive,
    Complete,
    Responding,
    Closed,
}

/// Tracks the `Content-Type` header across the field and value callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentTypeSlot {
    #[default]
    Unset,
    /// The last header field was `Content-Type`; its value comes next.
    Armed,
    Resolved(String),
}

impl ContentTypeSlot {
    pub fn resolved(&self) -> Option<&str> {
        match self {
            ContentTypeSlot::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

pub struct ConnectionState {
    handler: Arc<dyn BodyHandler>,
    content_type: ContentTypeSlot,
    exchange: Exchange,
    phase: Phase,
}

impl Debug for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("handler", &self.handler.name())
            .field("content_type", &self.content_type)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl ConnectionState {
    pub fn new(handler: Arc<dyn BodyHandler>) -> Self {
        Self { handler, content_type: ContentTypeSlot::Unset, exchange: Exchange::new(), phase: Phase::Accepted }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn content_type(&self) -> &ContentTypeSlot {
        &self.content_type
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn response(&self) -> &Response {
        self.exchange.response()
    }

    /// Whether the response is ready and has not been written yet.
    pub fn is_responding(&self) -> bool {
        self.phase == Phase::Responding
    }

    /// Releases everything the request holds, handler state first.
    ///
    /// Runs once; later calls do nothing.
    pub fn release(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }

        self.handler.cleanup(&mut self.exchange);
        self.content_type = ContentTypeSlot::Unset;
        self.exchange.take_response();
        self.phase = Phase::Closed;
    }
}

impl ParseCallbacks for ConnectionState {
    fn on_header_field(&mut self, name: &[u8]) {
        if self.phase == Phase::Accepted {
            self.phase = Phase::ParsingHeaders;
        }

        if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str().as_bytes()) {
            self.content_type = ContentTypeSlot::Armed;
        }
    }

    fn on_header_value(&mut self, value: &[u8]) {
        if self.content_type == ContentTypeSlot::Armed {
            self.content_type = ContentTypeSlot::Resolved(String::from_utf8_lossy(value).into_owned());
        }
    }

    fn on_headers_complete(&mut self) {
        self.phase = Phase::BodyActive;

        let content_type = self.content_type.resolved();
        debug!(handler = self.handler.name(), content_type = ?content_type, "request headers complete");

        if let Err(e) = self.handler.init(&mut self.exchange, content_type) {
            warn!(cause = %e, handler = self.handler.name(), "body handler init failed, ignoring the body");
            self.handler.cleanup(&mut self.exchange);
        }
    }

    fn on_body(&mut self, chunk: &[u8]) {
        if !self.exchange.has_context() || self.exchange.parse_error() {
            return;
        }

        if let Err(e) = self.handler.data(&mut self.exchange, chunk) {
            warn!(cause = %e, handler = self.handler.name(), "body handler rejected data");
            self.exchange.set_parse_error();
        }
    }

    fn on_message_complete(&mut self) {
        if self.phase >= Phase::Complete {
            return;
        }
        self.phase = Phase::Complete;

        if let Err(e) = self.handler.complete(&mut self.exchange) {
            error!(cause = %e, handler = self.handler.name(), "body handler failed to complete");
            self.exchange.set_response(Response::json(StatusCode::BAD_REQUEST, &ErrorBody::new("Bad Request")));
        }

        self.phase = Phase::Responding;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerContext, HandlerMode};
    use crate::protocol::HandlerError;

    /// A handler whose every phase fails.
    #[derive(Debug)]
    struct Failing;

    impl BodyHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn init(&self, _exchange: &mut Exchange, _content_type: Option<&str>) -> Result<(), HandlerError> {
            Err(HandlerError::alloc_failed(4096))
        }

        fn data(&self, _exchange: &mut Exchange, _chunk: &[u8]) -> Result<(), HandlerError> {
            Err(HandlerError::too_large(0))
        }

        fn complete(&self, _exchange: &mut Exchange) -> Result<(), HandlerError> {
            Err(HandlerError::too_large(0))
        }
    }

    fn headers(state: &mut ConnectionState, headers: &[(&str, &str)]) {
        for (name, value) in headers {
            state.on_header_field(name.as_bytes());
            state.on_header_value(value.as_bytes());
        }
        state.on_headers_complete();
    }

    #[test]
    fn content_type_is_matched_case_insensitively() {
        let mut state = ConnectionState::new(HandlerMode::JsonStream.handler());
        assert_eq!(state.phase(), Phase::Accepted);

        headers(&mut state, &[("Host", "localhost"), ("content-TYPE", "application/json"), ("Accept", "*/*")]);

        assert_eq!(state.content_type().resolved(), Some("application/json"));
        assert_eq!(state.phase(), Phase::BodyActive);
        assert!(matches!(state.exchange().context(), HandlerContext::JsonStream(_)));
    }

    #[test]
    fn repeated_content_type_replaces_the_earlier_one() {
        let mut state = ConnectionState::new(HandlerMode::Form.handler());
        headers(&mut state, &[("Content-Type", "text/plain"), ("Content-Type", "application/x-www-form-urlencoded")]);

        assert_eq!(state.content_type().resolved(), Some("application/x-www-form-urlencoded"));
        assert!(state.exchange().has_context());
    }

    #[test]
    fn body_flows_to_the_handler() {
        let mut state = ConnectionState::new(HandlerMode::JsonBuffer.handler());
        headers(&mut state, &[("Content-Type", "application/json")]);
        state.on_body(br#"{"data":"#);
        state.on_body(br#"[1,2]}"#);
        state.on_message_complete();

        assert!(state.is_responding());
        assert_eq!(state.response().body_str(), Some(r#"{"status":"ok","mode":"buffer","echo":[1,2]}"#));
    }

    #[test]
    fn complete_runs_once() {
        let mut state = ConnectionState::new(HandlerMode::Form.handler());
        headers(&mut state, &[("Content-Type", "application/x-www-form-urlencoded")]);
        state.on_body(b"a=1");
        state.on_message_complete();
        let first = state.response().clone();

        state.on_message_complete();
        assert_eq!(state.response(), &first);
    }

    #[test]
    fn failing_handler_gets_bad_request() {
        let mut state = ConnectionState::new(Arc::new(Failing));
        headers(&mut state, &[("Content-Type", "application/json")]);
        assert!(!state.exchange().has_context());

        state.on_message_complete();

        let response = state.response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.content_type(), Some(&mime::APPLICATION_JSON));
        assert_eq!(response.body_str(), Some(r#"{"error":"Bad Request","status":"error"}"#));
    }

    #[test]
    fn release_is_idempotent() {
        let mut state = ConnectionState::new(HandlerMode::JsonStream.handler());
        headers(&mut state, &[("Content-Type", "application/json")]);
        state.on_body(b"{");

        state.release();
        assert_eq!(state.phase(), Phase::Closed);
        assert!(!state.exchange().has_context());
        assert_eq!(state.content_type(), &ContentTypeSlot::Unset);

        state.release();
        assert_eq!(state.phase(), Phase::Closed);
    }

    #[test]
    fn release_before_any_callback() {
        let mut state = ConnectionState::new(HandlerMode::Form.handler());
        state.release();
        assert_eq!(state.phase(), Phase::Closed);
    }
}

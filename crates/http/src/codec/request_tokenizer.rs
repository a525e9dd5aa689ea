//! Push-style HTTP request tokenizer
//!
//! [`RequestTokenizer::execute`] consumes whatever bytes are available in the
//! receive buffer and reports what it found through [`ParseCallbacks`], in the
//! order a request is laid out on the wire:
//!
//! ```text
//! (on_header_field on_header_value)* on_headers_complete on_body* on_message_complete
//! ```
//!
//! Each header field and value is reported whole, exactly once. Body chunks are
//! reported as they arrive, so a body may be split at arbitrary byte positions
//! across calls. Only one message is tokenized per connection; bytes after it are
//! dropped.
//!
//! A syntax error halts the tokenizer: the failing call returns the error and
//! every later call returns [`ParseError::Halted`].

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::body::{PayloadDecoder, PayloadItem};
use crate::codec::header::HeaderDecoder;
use crate::protocol::ParseError;

/// Receiver of tokenizer events.
///
/// Callbacks run synchronously inside [`RequestTokenizer::execute`], possibly
/// several of them for one call.
pub trait ParseCallbacks {
    fn on_header_field(&mut self, name: &[u8]);

    fn on_header_value(&mut self, value: &[u8]);

    fn on_headers_complete(&mut self);

    fn on_body(&mut self, chunk: &[u8]);

    fn on_message_complete(&mut self);
}

#[derive(Debug)]
enum State {
    Head,
    Payload(PayloadDecoder),
    Done,
    Halted,
}

#[derive(Debug)]
pub struct RequestTokenizer {
    header_decoder: HeaderDecoder,
    state: State,
}

impl Default for RequestTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTokenizer {
    pub fn new() -> Self {
        Self { header_decoder: HeaderDecoder, state: State::Head }
    }

    /// Whether the single message of this connection has been fully tokenized.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, State::Halted)
    }

    /// Tokenizes as much of `src` as possible.
    ///
    /// Consumed bytes are removed from `src`; an incomplete request head stays in
    /// the buffer until more bytes arrive.
    pub fn execute<C: ParseCallbacks>(&mut self, src: &mut BytesMut, callbacks: &mut C) -> Result<(), ParseError> {
        match self.step(src, callbacks) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = State::Halted;
                Err(e)
            }
        }
    }

    fn step<C: ParseCallbacks>(&mut self, src: &mut BytesMut, callbacks: &mut C) -> Result<(), ParseError> {
        loop {
            match &mut self.state {
                State::Head => {
                    let Some(head) = self.header_decoder.decode(src)? else {
                        return Ok(());
                    };

                    debug!(method = head.method(), path = head.path(), version = head.version(), "received request head");
                    for (name, value) in head.headers() {
                        callbacks.on_header_field(name);
                        callbacks.on_header_value(value);
                    }
                    callbacks.on_headers_complete();

                    self.state = State::Payload(head.payload_size().into());
                }

                State::Payload(payload_decoder) => match payload_decoder.decode(src)? {
                    Some(PayloadItem::Chunk(bytes)) => callbacks.on_body(&bytes),
                    Some(PayloadItem::Eof) => {
                        self.state = State::Done;
                        callbacks.on_message_complete();
                    }
                    None => return Ok(()),
                },

                State::Done => {
                    if !src.is_empty() {
                        trace!(len = src.len(), "dropping bytes after the request message");
                        src.clear();
                    }
                    return Ok(());
                }

                State::Halted => return Err(ParseError::Halted),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    /// Records callbacks as readable events.
    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<String>,
        body: Vec<u8>,
    }

    impl ParseCallbacks for Recorder {
        fn on_header_field(&mut self, name: &[u8]) {
            self.events.push(format!("field {}", String::from_utf8_lossy(name)));
        }

        fn on_header_value(&mut self, value: &[u8]) {
            self.events.push(format!("value {}", String::from_utf8_lossy(value)));
        }

        fn on_headers_complete(&mut self) {
            self.events.push("headers complete".into());
        }

        fn on_body(&mut self, chunk: &[u8]) {
            self.body.extend_from_slice(chunk);
        }

        fn on_message_complete(&mut self) {
            self.events.push("message complete".into());
        }
    }

    const REQUEST: &str = indoc! {r##"
        POST / HTTP/1.1
        Content-Type: application/json
        Content-Length: 16

        {"data":{"x":1}}"##};

    #[test]
    fn whole_request_in_one_read() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::from(REQUEST);

        tokenizer.execute(&mut src, &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "field Content-Type",
                "value application/json",
                "field Content-Length",
                "value 16",
                "headers complete",
                "message complete"
            ]
        );
        assert_eq!(recorder.body, br#"{"data":{"x":1}}"#);
        assert!(src.is_empty());
        assert!(tokenizer.is_done());
    }

    #[test]
    fn byte_by_byte() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::new();

        for byte in REQUEST.as_bytes() {
            src.extend_from_slice(&[*byte]);
            tokenizer.execute(&mut src, &mut recorder).unwrap();
        }

        assert_eq!(recorder.events.iter().filter(|e| e.as_str() == "headers complete").count(), 1);
        assert_eq!(recorder.events.last().map(String::as_str), Some("message complete"));
        assert_eq!(recorder.body, br#"{"data":{"x":1}}"#);
    }

    #[test]
    fn no_body_completes_with_head() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::from("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");

        tokenizer.execute(&mut src, &mut recorder).unwrap();

        assert_eq!(recorder.events, vec!["field Host", "value localhost", "headers complete", "message complete"]);
    }

    #[test]
    fn chunked_body() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nname\r\n5\r\n=John\r\n0\r\n\r\n");

        tokenizer.execute(&mut src, &mut recorder).unwrap();

        assert_eq!(recorder.body, b"name=John");
        assert!(tokenizer.is_done());
    }

    #[test]
    fn trailing_bytes_are_dropped() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::from("GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n");

        tokenizer.execute(&mut src, &mut recorder).unwrap();

        assert_eq!(recorder.events, vec!["headers complete", "message complete"]);
        assert!(src.is_empty());
    }

    #[test]
    fn syntax_error_halts() {
        let mut tokenizer = RequestTokenizer::new();
        let mut recorder = Recorder::default();
        let mut src = BytesMut::from("POST / HTTP/1.1\r\nBad Header\r\n\r\n");

        assert!(tokenizer.execute(&mut src, &mut recorder).is_err());
        assert!(tokenizer.is_halted());

        let mut more = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
        assert!(matches!(tokenizer.execute(&mut more, &mut recorder), Err(ParseError::Halted)));
        assert!(recorder.events.is_empty());
    }
}

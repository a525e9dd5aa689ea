//! HTTP request head decoder
//!
//! Parses the request line and header fields with `httparse` and splits the whole
//! head off the receive buffer. Header names and values are not copied: the decoder
//! records their byte ranges inside the split-off head so the tokenizer can hand
//! them to the connection as slices.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadSize;
use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder turning the front of the receive buffer into a [`RequestHead`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder;

/// A parsed request head, owning the raw bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct RequestHead {
    bytes: Bytes,
    method: Range,
    path: Range,
    version: u8,
    headers: Vec<HeaderIndex>,
    payload_size: PayloadSize,
}

type Range = (usize, usize);

/// Byte ranges of one header's name and value within the raw head.
#[derive(Debug, Clone, Copy)]
struct HeaderIndex {
    name: Range,
    value: Range,
}

impl RequestHead {
    pub fn method(&self) -> &str {
        self.str_at(self.method)
    }

    pub fn path(&self) -> &str {
        self.str_at(self.path)
    }

    /// Minor HTTP version, `0` for HTTP/1.0 and `1` for HTTP/1.1.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Header `(name, value)` pairs in the order they were received.
    pub fn headers(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.headers.iter().map(|index| (&self.bytes[index.name.0..index.name.1], &self.bytes[index.value.0..index.value.1]))
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    fn str_at(&self, range: Range) -> &str {
        // httparse only hands out method and path tokens made of visible ASCII
        std::str::from_utf8(&self.bytes[range.0..range.1]).unwrap_or_default()
    }
}

impl Decoder for HeaderDecoder {
    type Item = RequestHead;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "GET / HTTP/1.1\r\n\r\n" is the shortest request worth parsing
        if src.len() < 14 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(head_size = body_offset, "parsed request head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let version = match req.version {
                    Some(v @ (0 | 1)) => v,
                    v => return Err(ParseError::InvalidVersion(v)),
                };

                let base = src.as_ptr() as usize;
                let method = record(base, req.method.unwrap_or_default().as_bytes());
                let path = record(base, req.path.unwrap_or_default().as_bytes());
                let header_index = req
                    .headers
                    .iter()
                    .map(|header| HeaderIndex { name: record(base, header.name.as_bytes()), value: record(base, header.value) })
                    .collect::<Vec<_>>();

                let payload_size = parse_payload(req.headers)?;
                let bytes = src.split_to(body_offset).freeze();

                Ok(Some(RequestHead { bytes, method, path, version, headers: header_index, payload_size }))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Start and end of `slice` relative to the buffer starting at `base`.
///
/// Slices handed out by httparse always point into the parsed buffer.
fn record(base: usize, slice: &[u8]) -> Range {
    let start = (slice.as_ptr() as usize).saturating_sub(base);
    (start, start + slice.len())
}

/// Determines how the body is framed, following
/// [RFC 9112 Section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3).
fn parse_payload(headers: &[httparse::Header<'_>]) -> Result<PayloadSize, ParseError> {
    let find = |name: &str| headers.iter().find(|header| header.name.eq_ignore_ascii_case(name)).map(|header| header.value);

    match (find(TRANSFER_ENCODING.as_str()), find(CONTENT_LENGTH.as_str())) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = std::str::from_utf8(cl_value).map_err(|_e| ParseError::invalid_content_length("value is not utf-8"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::Length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Chunked must be the final transfer coding when present.
fn is_chunked(value: &[u8]) -> bool {
    value.rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

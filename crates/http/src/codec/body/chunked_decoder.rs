//! Decoder for `Transfer-Encoding: chunked` bodies, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! Chunk extensions and trailer fields are read and dropped.

use super::PayloadItem;
use crate::protocol::ParseError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// Size of the current chunk while reading the size line, bytes left of it while reading data
    remaining: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining: 0 }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Hex digits of the chunk size
    Size,
    /// Whitespace after the size
    SizeLws,
    /// `;name=value` extensions, ignored
    Extension,
    /// LF closing the size line
    SizeLf,
    /// Chunk data
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// A trailer field line, ignored
    Trailer,
    /// LF closing a trailer line
    TrailerLf,
    /// CR of the final empty line, or the start of a trailer
    EndCr,
    /// LF of the final empty line
    EndLf,
    /// The last chunk has been read
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
                Body => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = self.remaining.min(src.len() as u64) as usize;
                    let bytes = src.split_to(len).freeze();
                    self.remaining -= len as u64;
                    if self.remaining == 0 {
                        self.state = BodyCr;
                    }

                    trace!(len, "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }
                _ => {
                    let Some(&byte) = src.first() else {
                        return Ok(None);
                    };
                    src.advance(1);
                    self.state = self.next_state(byte)?;
                }
            }
        }
    }
}

impl ChunkedDecoder {
    fn next_state(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        let next = match (self.state, byte) {
            (Size, b) if b.is_ascii_hexdigit() => {
                let digit = u64::from((b as char).to_digit(16).unwrap_or_default());
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("invalid overflow chunked length"))?;
                Size
            }
            (Size | SizeLws, b'\t' | b' ') => SizeLws,
            (Size | SizeLws, b';') => Extension,
            (Size | SizeLws | Extension, b'\r') => SizeLf,
            // extensions end at CRLF, a bare LF is rejected rather than guessed at
            (Extension, b'\n') => return Err(ParseError::invalid_body("invalid chunk extension contains newline")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') if self.remaining == 0 => EndCr,
            (SizeLf, b'\n') => Body,
            (BodyCr, b'\r') => BodyLf,
            (BodyLf, b'\n') => Size,
            (Trailer, b'\r') => TrailerLf,
            (Trailer, _) => Trailer,
            (TrailerLf, b'\n') => EndCr,
            (EndCr, b'\r') => EndLf,
            (EndCr, _) => Trailer,
            (EndLf, b'\n') => End,
            (state, b) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {b:#04x} in chunked state {state:?}")));
            }
        };
        Ok(next)
    }
}

//! Request body framing.
//!
//! The header decoder decides how the body is framed ([`PayloadSize`]) and the
//! [`PayloadDecoder`] then slices body bytes off the receive buffer:
//!
//! - [`LengthDecoder`](length_decoder::LengthDecoder): `Content-Length` bodies
//! - [`ChunkedDecoder`](chunked_decoder::ChunkedDecoder): `Transfer-Encoding: chunked`
//!
//! Chunks are split off the receive buffer with `BytesMut::split_to`, so a body
//! chunk handed to the connection shares memory with the bytes read from the socket.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

use bytes::Bytes;

pub use payload_decoder::PayloadDecoder;

/// One step of body decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of body bytes
    Chunk(Bytes),
    /// The body is finished
    Eof,
}

impl PayloadItem {
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// How the request body is framed, as declared by the request headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Body with a known length in bytes
    Length(u64),
    /// Body using chunked transfer encoding
    Chunked,
    /// No body
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty | PayloadSize::Length(0))
    }
}

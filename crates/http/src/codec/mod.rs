//! HTTP wire handling
//!
//! - Request side: [`RequestTokenizer`] turns raw bytes into [`ParseCallbacks`] events,
//!   using the [`header`] decoder for the request head and the [`body`] decoders for
//!   `Content-Length` and chunked bodies
//! - Response side: [`HeaderEncoder`] writes the status line and header block

mod body;
mod header;
mod request_tokenizer;

pub use body::{PayloadItem, PayloadSize};
pub use header::{HeaderEncoder, RequestHead, reason_phrase};
pub use request_tokenizer::{ParseCallbacks, RequestTokenizer};

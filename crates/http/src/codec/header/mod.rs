//! Request head decoding and response head encoding
//!
//! - [`HeaderDecoder`]: parses the request line and header fields into a [`RequestHead`]
//!   without copying header bytes
//! - [`HeaderEncoder`]: writes the status line and the fixed response header block

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_decoder::RequestHead;
pub use header_encoder::HeaderEncoder;
pub use header_encoder::reason_phrase;

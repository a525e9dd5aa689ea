//! HTTP connection handling module
//!
//! - [`HttpConnection`]: drives one accepted connection, from the first read to
//!   teardown, and answers exactly one request
//! - [`ConnectionState`]: receives the tokenizer callbacks, tracks the content type
//!   and the lifecycle [`Phase`], and hands the body to the active body handler

mod http_connection;
mod message_writer;
mod state;

pub use http_connection::HttpConnection;
pub use state::{ConnectionState, ContentTypeSlot, Phase};

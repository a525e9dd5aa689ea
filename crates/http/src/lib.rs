//! Streaming request-body pipeline for a small single-threaded HTTP server
//!
//! Every accepted connection answers exactly one request. Raw bytes from the
//! transport are pushed through a request tokenizer; its callbacks drive a
//! per-connection state machine that hands the body, chunk by chunk, to a
//! pluggable body handler. When the message is complete the handler fills in the
//! response, which is written with `Connection: close` before the connection is
//! torn down.
//!
//! # Example
//!
//! ```no_run
//! use micro_echo_http::handler::HandlerMode;
//! use micro_echo_http::server::{Server, ServerConfig};
//! use micro_echo_http::transport::ListenAddr;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = ServerConfig {
//!         listen: ListenAddr::Tcp { host: "127.0.0.1".into(), port: 8080 },
//!         mode: HandlerMode::JsonStream,
//!         tls: None,
//!     };
//!
//!     let server = match Server::bind(&config).await {
//!         Ok(server) => server,
//!         Err(e) => {
//!             eprintln!("bind server error: {e}");
//!             return;
//!         }
//!     };
//!     server.run().await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: request tokenizer ([`codec::RequestTokenizer`] and its
//!   [`codec::ParseCallbacks`]) and the response head encoder
//! - [`connection`]: [`connection::HttpConnection`] drives one connection,
//!   [`connection::ConnectionState`] routes tokenizer callbacks to the body handler
//! - [`handler`]: the [`handler::BodyHandler`] contract and the JSON and form handlers
//! - [`protocol`]: response value and error types
//! - [`transport`]: TCP, unix socket and TLS streams
//! - [`server`]: configuration and accept loop
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top-level connection error
//! - [`protocol::ParseError`]: request syntax and read errors; these never produce
//!   a response
//! - [`protocol::SendError`]: response writing errors
//! - [`protocol::HandlerError`]: body too large or allocation failure inside a handler
//! - [`server::ServerError`]: bind and TLS setup errors
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, no keep-alive
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;

//! Protocol vocabulary shared by the tokenizer, the connection and the body handlers.
//!
//! - **Response** ([`response`]): the status/body/content-type triple a handler fills in,
//!   plus the small JSON shapes every handler answers with
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: top-level connection error
//!   - [`ParseError`]: request tokenizing errors
//!   - [`SendError`]: response writing errors
//!   - [`HandlerError`]: body handler failures (size limits, allocation)

mod response;
pub use response::ErrorBody;
pub use response::MessageBody;
pub use response::Response;

mod error;
pub use error::HandlerError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

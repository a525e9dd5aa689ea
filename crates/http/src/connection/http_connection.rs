use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::codec::RequestTokenizer;
use crate::connection::message_writer::MessageWriter;
use crate::connection::state::{ConnectionState, Phase};
use crate::handler::BodyHandler;
use crate::protocol::{HttpError, ParseError};

const READ_BUFFER_SIZE: usize = 8 * 1024;
const WRITE_BUFFER_SIZE: usize = 256;

/// One accepted connection answering a single request
///
/// `HttpConnection` reads from the transport, feeds the bytes to the
/// [`RequestTokenizer`] and lets the [`ConnectionState`] route the callbacks to the
/// body handler. Once the message is complete the response is written, the write
/// side is shut down and the connection is torn down.
///
/// A request with a syntax error gets no response: the error is logged, the rest of
/// that read is dropped and the connection waits for the peer to close it.
///
/// Teardown runs exactly once, on the way out of [`process`](Self::process) or when
/// the connection is dropped before that.
pub struct HttpConnection<S> {
    stream: Option<S>,
    read_buffer: BytesMut,
    tokenizer: RequestTokenizer,
    state: ConnectionState,
    writer: MessageWriter,
}

impl<S> std::fmt::Debug for HttpConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("open", &self.stream.is_some())
            .field("tokenizer", &self.tokenizer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, handler: Arc<dyn BodyHandler>) -> Self {
        Self {
            stream: Some(stream),
            read_buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            tokenizer: RequestTokenizer::new(),
            state: ConnectionState::new(handler),
            writer: MessageWriter::with_capacity(WRITE_BUFFER_SIZE),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub async fn process(mut self) -> Result<(), HttpError> {
        let result = self.do_process().await;
        self.teardown();
        result
    }

    async fn do_process(&mut self) -> Result<(), HttpError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(());
            };

            self.read_buffer.reserve(READ_BUFFER_SIZE);
            let read = stream.read_buf(&mut self.read_buffer).await.map_err(ParseError::io)?;
            if read == 0 {
                info!("peer closed the connection");
                return Ok(());
            }

            if let Err(e) = self.tokenizer.execute(&mut self.read_buffer, &mut self.state) {
                error!(cause = %e, "failed to parse request");
                self.read_buffer.clear();
                continue;
            }

            if self.state.is_responding() {
                self.writer.write(stream, self.state.response()).await?;
                debug!(status = self.state.response().status().as_u16(), "response sent");

                if let Err(e) = stream.shutdown().await {
                    debug!(cause = %e, "failed to shut down the write side");
                }
                return Ok(());
            }
        }
    }

    /// Releases handler state, then the transport. Only the first call has any effect.
    pub fn teardown(&mut self) {
        self.state.release();
        if self.stream.take().is_some() {
            debug!("connection closed");
        }
    }
}

impl<S> Drop for HttpConnection<S> {
    fn drop(&mut self) {
        self.state.release();
        self.stream.take();
    }
}

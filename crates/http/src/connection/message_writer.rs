use crate::codec::HeaderEncoder;
use crate::protocol::{Response, SendError};
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Writes a [`Response`] as two writes, the header block and then the body.
#[derive(Debug)]
pub struct MessageWriter {
    buffer: BytesMut,
    encoder: HeaderEncoder,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: HeaderEncoder }
    }

    pub async fn write<W>(&mut self, writer: &mut W, response: &Response) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        self.buffer.clear();
        self.encoder.encode(response, &mut self.buffer);

        writer.write_all(&self.buffer).await?;
        if !response.body().is_empty() {
            writer.write_all(response.body()).await?;
        }
        writer.flush().await?;

        trace!(head = self.buffer.len(), body = response.body().len(), "response written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn head_then_body() {
        let mut writer = MessageWriter::with_capacity(256);
        let mut out = Vec::new();
        let response = Response::new(StatusCode::OK, "hello", Some(mime::TEXT_PLAIN));

        writer.write(&mut out, &response).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("Connection: close\r\n\r\nhello"));
    }
}

//! Serializes the status line and header block of a [`Response`].
//!
//! Every response carries exactly three headers: `Content-Type`, an exact
//! `Content-Length` and `Connection: close`. Only 200 is rendered with the `OK`
//! reason; any other status code is rendered with `Bad Request`.

use crate::protocol::Response;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use std::io;
use std::io::Write;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    pub fn encode(&self, response: &Response, dst: &mut BytesMut) {
        dst.reserve(INIT_HEADER_SIZE);

        let default_type = mime::TEXT_PLAIN;
        let content_type = response.content_type().unwrap_or(&default_type);

        // writing into a BytesMut cannot fail
        let _ = write!(
            FastWrite(dst),
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            response.status().as_u16(),
            reason_phrase(response.status()),
            content_type,
            response.body().len(),
        );
    }
}

pub fn reason_phrase(status: StatusCode) -> &'static str {
    if status == StatusCode::OK { "OK" } else { "Bad Request" }
}

struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(response: &Response) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode(response, &mut dst);
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn ok_json_head() {
        let response = Response::new(StatusCode::OK, r#"{"status":"ok"}"#, Some(mime::APPLICATION_JSON));
        let expected = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: application/json\r\n",
            "Content-Length: 15\r\n",
            "Connection: close\r\n",
            "\r\n",
        );
        assert_eq!(encode(&response), expected);
    }

    #[test]
    fn defaults_to_text_plain() {
        let response = Response::new(StatusCode::OK, "", None);
        assert!(encode(&response).contains("Content-Type: text/plain\r\n"));
        assert!(encode(&response).contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn any_other_status_is_bad_request() {
        assert!(encode(&Response::new(StatusCode::BAD_REQUEST, "x", None)).starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(encode(&Response::new(StatusCode::INTERNAL_SERVER_ERROR, "x", None)).starts_with("HTTP/1.1 500 Bad Request\r\n"));
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let response = Response::new(StatusCode::OK, "héllo", None);
        assert!(encode(&response).contains("Content-Length: 6\r\n"));
    }
}

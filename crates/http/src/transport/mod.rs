//! Byte streams the server accepts connections on
//!
//! [`Listener`] binds either a TCP address or, on unix, a socket path, and yields
//! [`PlainStream`]s. A [`Transport`] is what a connection finally runs on: a plain
//! stream, or the same stream wrapped in a TLS session after the handshake.

mod tls;

use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio_rustls::server::TlsStream;
use tracing::debug;

pub use tls::{TlsConfig, TlsError, create_server_config};

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Display for ListenAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenAddr::Tcp { host, port } => write!(f, "{host}:{port}"),
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    pub async fn bind(addr: &ListenAddr) -> io::Result<Self> {
        match addr {
            ListenAddr::Tcp { host, port } => Ok(Listener::Tcp(TcpListener::bind((host.as_str(), *port)).await?)),

            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                // a socket file left behind by an earlier run would make bind fail
                if std::fs::symlink_metadata(path).is_ok() {
                    debug!(path = %path.display(), "removing stale socket file");
                    std::fs::remove_file(path)?;
                }
                Ok(Listener::Unix(UnixListener::bind(path)?))
            }

            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "unix sockets are not supported on this platform")),
        }
    }

    /// Local address in a form fit for logging.
    pub fn local_addr(&self) -> io::Result<String> {
        match self {
            Listener::Tcp(listener) => Ok(listener.local_addr()?.to_string()),
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let addr = listener.local_addr()?;
                Ok(addr.as_pathname().map_or_else(|| "unix:(unnamed)".to_owned(), |path| format!("unix:{}", path.display())))
            }
        }
    }

    /// Accepts the next connection, with the peer address for logging.
    pub async fn accept(&self) -> io::Result<(PlainStream, String)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((PlainStream::Tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _addr) = listener.accept().await?;
                Ok((PlainStream::Unix(stream), "unix".to_owned()))
            }
        }
    }
}

/// An accepted socket before any TLS.
#[derive(Debug)]
pub enum PlainStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

/// The stream a connection runs on.
#[derive(Debug)]
pub enum Transport {
    Plain(PlainStream),
    Tls(Box<TlsStream<PlainStream>>),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }
}

impl From<PlainStream> for Transport {
    fn from(stream: PlainStream) -> Self {
        Transport::Plain(stream)
    }
}

impl From<TlsStream<PlainStream>> for Transport {
    fn from(stream: TlsStream<PlainStream>) -> Self {
        Transport::Tls(Box::new(stream))
    }
}

impl AsyncRead for PlainStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PlainStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            PlainStream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PlainStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            PlainStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            PlainStream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PlainStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            PlainStream::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PlainStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            PlainStream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn tcp_round_trip_through_transport() {
        let addr = ListenAddr::Tcp { host: "127.0.0.1".into(), port: 0 };
        let listener = Listener::bind(&addr).await.unwrap();
        let local = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(local).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            reply
        });

        let (stream, _peer) = listener.accept().await.unwrap();
        let mut transport = Transport::from(stream);
        assert!(!transport.is_tls());

        let mut buf = [0; 4];
        transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        transport.write_all(b"pong").await.unwrap();
        transport.shutdown().await.unwrap();
        drop(transport);

        assert_eq!(client.await.unwrap(), b"pong");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unix_listener_replaces_stale_socket() {
        let path = std::env::temp_dir().join(format!("micro-echo-test-{}.sock", std::process::id()));
        let addr = ListenAddr::Unix(path.clone());

        let first = Listener::bind(&addr).await.unwrap();
        drop(first);
        let second = Listener::bind(&addr).await.unwrap();
        assert_eq!(second.local_addr().unwrap(), format!("unix:{}", path.display()));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn listen_addr_display() {
        assert_eq!(ListenAddr::Tcp { host: "0.0.0.0".into(), port: 8080 }.to_string(), "0.0.0.0:8080");
        assert_eq!(ListenAddr::Unix("/tmp/echo.sock".into()).to_string(), "unix:/tmp/echo.sock");
    }
}

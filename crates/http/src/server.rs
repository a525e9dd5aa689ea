//! Accept loop
//!
//! [`Server::bind`] validates a [`ServerConfig`], loads the TLS configuration and
//! binds the listener. [`Server::run`] then accepts connections forever, spawning
//! one task per connection that performs the TLS handshake when enabled and hands
//! the stream to an [`HttpConnection`] together with the shared body handler.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::handler::{BodyHandler, HandlerMode};
use crate::transport::{ListenAddr, Listener, TlsConfig, TlsError, Transport, create_server_config};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: ListenAddr,
    pub mode: HandlerMode,
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        match &self.listen {
            ListenAddr::Tcp { host, .. } if host.is_empty() => Err(ServerError::invalid_config("listen host must not be empty")),
            ListenAddr::Unix(path) if path.as_os_str().is_empty() => Err(ServerError::invalid_config("socket path must not be empty")),
            _ => Ok(()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ServerError {
    pub fn invalid_config<S: ToString>(str: S) -> Self {
        Self::InvalidConfig { reason: str.to_string() }
    }
}

pub struct Server {
    listener: Listener,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<dyn BodyHandler>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("tls", &self.acceptor.is_some())
            .field("handler", &self.handler.name())
            .finish()
    }
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let acceptor = match &config.tls {
            Some(tls) => Some(TlsAcceptor::from(create_server_config(tls)?)),
            None => None,
        };

        let listener =
            Listener::bind(&config.listen).await.map_err(|source| ServerError::Bind { addr: config.listen.to_string(), source })?;

        Ok(Self { listener, acceptor, handler: config.mode.handler() })
    }

    pub fn local_addr(&self) -> io::Result<String> {
        self.listener.local_addr()
    }

    pub fn is_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    pub async fn run(&self) {
        info!(
            addr = %self.local_addr().unwrap_or_default(),
            tls = self.is_tls(),
            handler = self.handler.name(),
            "start listening"
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(stream_and_peer) => stream_and_peer,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };
            debug!(peer = %peer, "accepted connection");

            let acceptor = self.acceptor.clone();
            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                let transport = match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            let version = tls_stream.get_ref().1.protocol_version();
                            debug!(peer = %peer, ?version, "tls handshake complete");
                            Transport::from(tls_stream)
                        }
                        Err(e) => {
                            warn!(cause = %e, peer = %peer, "tls handshake failed");
                            return;
                        }
                    },
                    None => Transport::from(stream),
                };

                let connection = HttpConnection::new(transport, handler);
                match connection.process().await {
                    Ok(()) => {
                        info!(peer = %peer, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(cause = %e, peer = %peer, "service has error, connection shutdown");
                    }
                }
            });
        }
    }
}

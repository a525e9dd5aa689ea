use std::path::PathBuf;

use clap::{ArgAction, Parser};
use micro_echo_http::handler::HandlerMode;
use micro_echo_http::server::{ServerConfig, ServerError};
use micro_echo_http::transport::{ListenAddr, TlsConfig};
use tracing::Level;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TLS_PORT: u16 = 8443;

/// Small HTTP/HTTPS server answering JSON and form request bodies.
///
/// Examples:
///   micro-echo -p 8080 -m json-buffer
///   micro-echo -S -c server.crt -k server.key -C ca.crt
#[derive(Parser, Debug)]
#[command(name = "micro-echo", version, disable_help_flag = true)]
pub struct Cli {
    /// Bind to a specific host
    #[arg(short = 'h', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Listen on TCP port [default: 8080, or 8443 with --ssl]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen on a unix socket path instead of TCP
    #[arg(short, long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Body handler: json-stream, json-buffer or form
    #[arg(short, long, default_value_t = HandlerMode::JsonStream)]
    pub mode: HandlerMode,

    /// Enable HTTPS
    #[arg(short = 'S', long)]
    pub ssl: bool,

    /// Certificate file (PEM)
    #[arg(short, long, value_name = "FILE")]
    pub cert: Option<PathBuf>,

    /// Private key file (PEM)
    #[arg(short, long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// CA file for verifying client certificates
    #[arg(short = 'C', long, value_name = "FILE")]
    pub ca: Option<PathBuf>,

    /// Maximum log level
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    pub fn into_config(self) -> Result<ServerConfig, ServerError> {
        let tls = if self.ssl {
            match (self.cert, self.key) {
                (Some(cert), Some(key)) => Some(TlsConfig { cert, key, ca: self.ca }),
                _ => return Err(ServerError::invalid_config("TLS enabled but certificate or key file not specified, use -c and -k")),
            }
        } else {
            None
        };

        let listen = match self.socket {
            Some(path) => ListenAddr::Unix(path),
            None => {
                let default_port = if tls.is_some() { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
                ListenAddr::Tcp { host: self.host, port: self.port.unwrap_or(default_port) }
            }
        };

        let config = ServerConfig { listen, mode: self.mode, tls };
        config.validate()?;
        Ok(config)
    }
}

//! TLS server configuration.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tracing::info;

/// Certificate, key and optional client CA, all PEM files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA bundle for verifying client certificates. Clients without a
    /// certificate are still accepted.
    pub ca: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("failed to read TLS {what} file '{}': {source}", .path.display())]
    Read { what: &'static str, path: PathBuf, source: io::Error },

    #[error("TLS {what} file '{}' does not contain any usable entries", .path.display())]
    Empty { what: &'static str, path: PathBuf },

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("invalid client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Builds the rustls server config for `config`.
pub fn create_server_config(config: &TlsConfig) -> Result<Arc<ServerConfig>, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let certs = read_certs("certificate", &config.cert)?;
    let key = read_key(&config.key)?;

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider)).with_safe_default_protocol_versions()?;

    let builder = match &config.ca {
        Some(ca) => {
            let mut roots = RootCertStore::empty();
            for cert in read_certs("CA", ca)? {
                roots.add(cert)?;
            }
            info!(ca = %ca.display(), roots = roots.len(), "client certificates will be verified when presented");
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider).allow_unauthenticated().build()?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(builder.with_single_cert(certs, key)?))
}

fn open(what: &'static str, path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read { what, path: path.to_owned(), source })
}

fn read_certs(what: &'static str, path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(what, path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read { what, path: path.to_owned(), source })?;

    if certs.is_empty() {
        return Err(TlsError::Empty { what, path: path.to_owned() });
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open("key", path)?)
        .map_err(|source| TlsError::Read { what: "key", path: path.to_owned(), source })?
        .ok_or_else(|| TlsError::Empty { what: "key", path: path.to_owned() })
}

//! TLS termination.
//!
//! # Responsibilities
//! - Resolve certificate and key paths against the working directory
//! - Load PEM material and build the rustls server configuration
//! - Hand an acceptor to the serve loop
//!
//! # Design Decisions
//! - Uses rustls (no OpenSSL dependency); rustls' protocol floor of
//!   TLS 1.2 is the intended minimum
//! - Missing certificate or key files are a fatal startup error

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

/// Error type for TLS setup failures.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
}

/// Build a TLS acceptor from the configured certificate and key files.
pub fn build_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    let cert_path = resolve(&config.cert_file)?;
    let key_path = resolve(&config.key_file)?;

    let certs = load_certs(&cert_path)?;
    let key = load_key(&key_path)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    tracing::info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "TLS termination enabled"
    );

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Resolve a configured path against the working directory, requiring it to
/// exist.
fn resolve(path: &str) -> Result<PathBuf, TlsError> {
    let resolved = std::env::current_dir()
        .map(|wd| wd.join(path))
        .unwrap_or_else(|_| PathBuf::from(path));
    if !resolved.exists() {
        return Err(TlsError::NotFound(resolved));
    }
    Ok(resolved)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

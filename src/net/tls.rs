//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Turn configured certificate material (inline PEM or file paths) into
//!   a rustls server configuration, failing fast on anything malformed
//! - Build client configurations for outbound TLS, verified by default

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid certificate PEM")]
    Certificate(#[source] io::Error),

    #[error("no certificate found in PEM input")]
    NoCertificate,

    #[error("invalid private key PEM")]
    Key(#[source] io::Error),

    #[error("no private key found in PEM input")]
    NoKey,

    #[error("TLS material must come from exactly one of inline PEM or file paths, not both")]
    AmbiguousSource,

    #[error("TLS material requires both a certificate and a key from one source")]
    MissingSource,

    #[error("TLS configuration rejected")]
    Rustls(#[from] rustls::Error),
}

/// Where certificate material comes from.
#[derive(Debug, Clone)]
pub enum TlsSource {
    Pem { cert: Vec<u8>, key: Vec<u8> },
    Files { cert: PathBuf, key: PathBuf },
}

/// One certificate/key pair plus the plain-listener redirect policy.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub source: TlsSource,
    /// Redirect plain-text requests to https.
    pub enforce: bool,
}

impl TlsSource {
    fn read(&self) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        match self {
            TlsSource::Pem { cert, key } => Ok((cert.clone(), key.clone())),
            TlsSource::Files { cert, key } => {
                let read = |path: &PathBuf| {
                    std::fs::read(path).map_err(|source| TlsError::Read {
                        path: path.clone(),
                        source,
                    })
                };
                Ok((read(cert)?, read(key)?))
            }
        }
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build the server configuration for the secure listener.
pub fn server_config(material: &TlsMaterial) -> Result<Arc<ServerConfig>, TlsError> {
    let (cert_pem, key_pem) = material.source.read()?;

    let mut reader = cert_pem.as_slice();
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(TlsError::Certificate)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate);
    }

    let mut reader = key_pem.as_slice();
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut reader)
        .map_err(TlsError::Key)?
        .ok_or(TlsError::NoKey)?;

    let mut config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Build the client configuration for outbound TLS.
///
/// Certificates are verified against the bundled web PKI roots unless
/// `insecure_skip_verify` is set.
pub fn client_config(insecure_skip_verify: bool) -> Result<Arc<ClientConfig>, TlsError> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let config = if insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
            .with_no_client_auth()
    } else {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Accepts any server certificate; handshake signatures are still checked.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

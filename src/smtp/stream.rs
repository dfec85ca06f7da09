//! Plaintext or TLS socket behind one type.

use crate::error::SmtpError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

pub(crate) enum SmtpStream {
    Plain(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

impl SmtpStream {
    pub fn new(tcp: TcpStream) -> Self {
        Self::Plain(BufReader::new(tcp))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Read one line including its terminator; 0 means end of stream.
    pub async fn read_line(&mut self, buf: &mut String) -> Result<usize, SmtpError> {
        let result = match self {
            Self::Plain(r) => r.read_line(buf).await,
            Self::Tls(r) => r.read_line(buf).await,
        };
        result.map_err(|e| SmtpError::Io(e.to_string()))
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), SmtpError> {
        let result = match self {
            Self::Plain(r) => r.get_mut().write_all(data).await,
            Self::Tls(r) => r.get_mut().write_all(data).await,
        };
        result.map_err(|e| SmtpError::Io(e.to_string()))
    }

    pub async fn flush(&mut self) -> Result<(), SmtpError> {
        let result = match self {
            Self::Plain(r) => r.get_mut().flush().await,
            Self::Tls(r) => r.get_mut().flush().await,
        };
        result.map_err(|e| SmtpError::Io(e.to_string()))
    }

    pub async fn shutdown(&mut self) {
        let result = match self {
            Self::Plain(r) => r.get_mut().shutdown().await,
            Self::Tls(r) => r.get_mut().shutdown().await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Socket shutdown failed");
        }
    }

    /// Perform the TLS handshake over the plaintext socket.
    pub async fn upgrade(self, host: &str, skip_verify: bool) -> Result<Self, SmtpError> {
        let tcp = match self {
            Self::Plain(r) => r.into_inner(),
            Self::Tls(_) => return Err(SmtpError::Tls("connection is already encrypted".into())),
        };

        let connector = TlsConnector::from(Arc::new(client_config(skip_verify)?));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| SmtpError::Tls(format!("invalid server name '{}': {}", host, e)))?;

        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| SmtpError::Tls(format!("handshake failed: {}", e)))?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }
}

fn client_config(skip_verify: bool) -> Result<ClientConfig, SmtpError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| SmtpError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    if skip_verify {
        tracing::warn!("TLS certificate verification disabled");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier::new(&provider)));
    }
    Ok(config)
}

/// Accepts any server certificate; handshake signatures are still checked.
#[derive(Debug)]
struct NoCertVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl NoCertVerifier {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for NoCertVerifier {
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
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

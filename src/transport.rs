//! Socket and TLS setup
//!
//! Opens the TCP connection for a [`ConnectionParams`] and secures it
//! according to its [`TransportMode`]. All three modes end up as the
//! same boxed stream type so the rest of the crate deals with a single
//! [`ImapSession`].

use crate::config::{ConnectionParams, TransportMode};
use crate::error::{Error, Result};
use futures::io::{AsyncRead, AsyncWrite};
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::debug;

/// Any byte stream async-imap can drive.
pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> ImapStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

pub type BoxedStream = Box<dyn ImapStream>;

/// A connected but not yet authenticated IMAP client.
pub type ImapClient = async_imap::Client<BoxedStream>;

/// A logged-in IMAP session over any transport.
pub type ImapSession = async_imap::Session<BoxedStream>;

/// Open a fresh connection to `params.host:params.port`.
///
/// For [`TransportMode::StartTls`] the STARTTLS command is issued on
/// the plaintext stream before the handshake. No command beyond that
/// is sent; the caller logs in.
pub async fn open(params: &ConnectionParams) -> Result<ImapClient> {
    let addr = params.address();
    debug!("Connecting to IMAP server at {} ({})", addr, params.transport);

    let tcp_stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::ConnectFailed(format!("{addr}: {e}")))?;

    let stream: BoxedStream = match params.transport {
        TransportMode::Plain => Box::new(tcp_stream.compat()),
        TransportMode::Tls => Box::new(tls_handshake(params, tcp_stream).await?.compat()),
        TransportMode::StartTls => {
            let mut client = async_imap::Client::new(tcp_stream.compat());
            client
                .run_command_and_check_ok("STARTTLS", None)
                .await
                .map_err(|e| Error::ConnectFailed(format!("STARTTLS failed: {e}")))?;

            let inner = client.into_inner().into_inner();
            Box::new(tls_handshake(params, inner).await?.compat())
        }
    };

    Ok(async_imap::Client::new(stream))
}

async fn tls_handshake(params: &ConnectionParams, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector(params.accept_invalid_certs)?;
    let server_name = ServerName::try_from(params.host.clone())
        .map_err(|e| Error::ConnectFailed(format!("Invalid server name: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::ConnectFailed(format!("TLS handshake failed: {e}")))
}

/// Build a TLS connector on the ring provider.
///
/// Verifies against the webpki root store unless `accept_invalid_certs`
/// is set, in which case any certificate is accepted.
fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::ConnectFailed(format!("TLS setup failed: {e}")))?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier that accepts all certificates.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// Shared transport configuration
//
// Timeouts and TLS policy shared by every protocol client. Samsung TVs
// serve their secure channel with a self-signed certificate, so the
// WebSocket connector can be told to skip verification.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection tuning shared by all protocol clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for a connect / handshake / request.
    pub timeout: Duration,
    /// Accept self-signed certificates on `wss://` and `https://` endpoints.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            accept_invalid_certs: true,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` honouring the timeout and TLS policy.
    pub fn build_http_client(&self) -> Result<reqwest::Client, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;
        Ok(client)
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Race `fut` against the configured timeout.
    pub(crate) async fn within<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: self.timeout_ms(),
            })?
    }
}

/// Open a WebSocket to `url`, bounded by the transport timeout.
pub(crate) async fn connect_websocket(
    url: &Url,
    transport: &TransportConfig,
) -> Result<WsStream, Error> {
    tracing::debug!(url = %redact(url), "opening WebSocket channel");

    let connector = if url.scheme() == "wss" && transport.accept_invalid_certs {
        Some(Connector::Rustls(Arc::new(insecure_tls_config()?)))
    } else {
        None
    };

    let (stream, _response) = transport
        .within(async {
            tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
                .await
                .map_err(map_ws_error)
        })
        .await?;

    Ok(stream)
}

/// Translate a tungstenite failure into the crate error.
pub(crate) fn map_ws_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response) => match response.status().as_u16() {
            401 | 403 => Error::Unauthorized,
            status => Error::HandshakeRejected {
                message: format!("HTTP {status} on WebSocket upgrade"),
            },
        },
        tungstenite::Error::Io(e) => Error::Io(e),
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            Error::WebSocketClosed {
                code: 1006,
                reason: "connection closed".into(),
            }
        }
        tungstenite::Error::Tls(e) => Error::Tls(e.to_string()),
        other => Error::WebSocketConnect(other.to_string()),
    }
}

/// Strip query parameters (tokens live there) before logging a URL.
pub(crate) fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

// ── TLS ──────────────────────────────────────────────────────────────

fn insecure_tls_config() -> Result<ClientConfig, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth();
    Ok(config)
}

/// Certificate verifier that trusts any chain but still checks handshake
/// signatures, so the session keys are bound to the presented certificate.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_drops_token_query() {
        let url = Url::parse("wss://10.0.0.5:8002/api/v2/channels/x?name=YQ==&token=secret")
            .expect("valid url");
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.ends_with("/api/v2/channels/x"));
    }

    #[test]
    fn insecure_tls_config_builds() {
        assert!(insecure_tls_config().is_ok());
    }
}

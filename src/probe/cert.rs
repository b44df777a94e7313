//! TLS certificate probe
//!
//! Lets a list of `host:port` targets run through the same engine as HTTP
//! steps. The engine-facing piece is [`CertProbe`], which adapts a
//! [`StaplingResolver`] capability (connect, then resolve revocation status)
//! to the [`Probe`] interface.
//!
//! [`TlsResolver`] is the production resolver: it performs a TLS handshake
//! with either full chain verification against the webpki roots or no
//! verification at all, capturing the end-entity certificate and the stapled
//! OCSP response during the handshake. Revocation status resolves to a
//! failure when the server stapled nothing or the certificate is expired.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::client::WebPkiServerVerifier;
use tokio_rustls::rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::*;

use crate::engine::{Method, Probe, ProbeError};

/// How the server certificate chain is checked during connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Full chain verification against the bundled webpki roots
    #[default]
    Full,
    /// Accept any certificate; only the stapled OCSP data is examined
    NoVerification,
}

/// Errors from the certificate-resolution capability
#[derive(Debug, Error)]
pub enum CertError {
    #[error("invalid target '{0}': expected host[:port]")]
    InvalidTarget(String),

    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("server presented no certificate")]
    NoPeerCertificate,

    #[error("no stapled OCSP response")]
    NoStapledOcsp,

    #[error("certificate expired {0} days ago")]
    Expired(i64),

    #[error("certificate unparsable: {0}")]
    Parse(String),
}

/// What a successful TLS handshake yielded
#[derive(Debug, Clone, Default)]
pub struct TlsSession {
    /// End-entity certificate, DER
    pub peer_cert: Option<Vec<u8>>,
    /// Stapled OCSP response bytes; empty when the server stapled nothing
    pub ocsp_response: Vec<u8>,
}

/// Resolved revocation status for one target
#[derive(Debug, Clone)]
pub struct CertStatus {
    pub summary: String,
}

/// The consumed certificate-resolution capability
#[async_trait]
pub trait StaplingResolver: Send + Sync {
    /// Open a TLS connection and capture handshake material
    async fn connect(
        &self,
        host: &str,
        port: u16,
        verify: VerifyMode,
    ) -> Result<TlsSession, CertError>;

    /// Resolve the revocation status of a captured session
    fn revocation_status(&self, session: &TlsSession) -> Result<CertStatus, CertError>;
}

/// Adapts a [`StaplingResolver`] to the engine's [`Probe`] interface
///
/// Step targets are `host[:port]`, port defaulting to 443. Method and
/// payload do not apply to TLS targets and are ignored.
pub struct CertProbe<R> {
    resolver: R,
    verify: VerifyMode,
}

impl<R: StaplingResolver> CertProbe<R> {
    pub fn new(resolver: R, verify: VerifyMode) -> Self {
        Self { resolver, verify }
    }
}

#[async_trait]
impl<R: StaplingResolver> Probe for CertProbe<R> {
    async fn perform(
        &self,
        _method: Method,
        target: &str,
        _payload: Option<&[(String, String)]>,
    ) -> Result<String, ProbeError> {
        let (host, port) = parse_target(target).map_err(|e| ProbeError::Transport(e.to_string()))?;

        let session = self
            .resolver
            .connect(&host, port, self.verify)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = self
            .resolver
            .revocation_status(&session)
            .map_err(|e| ProbeError::Rejected(e.to_string()))?;

        Ok(status.summary)
    }
}

fn parse_target(target: &str) -> Result<(String, u16), CertError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(CertError::InvalidTarget(target.to_string()));
    }
    match target.rsplit_once(':') {
        None => Ok((target.to_string(), 443)),
        Some((host, port)) => {
            if host.is_empty() {
                return Err(CertError::InvalidTarget(target.to_string()));
            }
            let port = port
                .parse::<u16>()
                .map_err(|_| CertError::InvalidTarget(target.to_string()))?;
            Ok((host.to_string(), port))
        }
    }
}

/// Production resolver backed by `tokio-rustls`
#[derive(Debug, Default)]
pub struct TlsResolver;

impl TlsResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StaplingResolver for TlsResolver {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        verify: VerifyMode,
    ) -> Result<TlsSession, CertError> {
        let verifier = Arc::new(CaptureVerifier::new(verify)?);

        let provider = Arc::new(ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| CertError::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| CertError::InvalidTarget(host.to_string()))?;

        debug!(host = %host, port = port, verify = ?verify, "Opening TLS connection");
        let stream = TcpStream::connect((host, port)).await?;
        let connector = TlsConnector::from(Arc::new(config));
        connector
            .connect(server_name, stream)
            .await
            .map_err(|e| CertError::Tls(e.to_string()))?;

        Ok(verifier.take_session())
    }

    fn revocation_status(&self, session: &TlsSession) -> Result<CertStatus, CertError> {
        let der = session
            .peer_cert
            .as_deref()
            .ok_or(CertError::NoPeerCertificate)?;

        if session.ocsp_response.is_empty() {
            return Err(CertError::NoStapledOcsp);
        }

        let (_, cert) =
            parse_x509_certificate(der).map_err(|e| CertError::Parse(format!("{e:?}")))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let days_left = (cert.validity().not_after.timestamp() - now) / 86400;
        if days_left < 0 {
            return Err(CertError::Expired(-days_left));
        }

        Ok(CertStatus {
            summary: format!(
                "{}, stapled OCSP response present ({} bytes), expires in {} days",
                cert.subject(),
                session.ocsp_response.len(),
                days_left
            ),
        })
    }
}

/// Server-certificate verifier that captures handshake material
///
/// With [`VerifyMode::Full`] it delegates every decision to the standard
/// webpki verifier; with [`VerifyMode::NoVerification`] it accepts anything.
/// Either way it records the end-entity certificate and the stapled OCSP
/// bytes so the revocation check can inspect them after the handshake.
#[derive(Debug)]
struct CaptureVerifier {
    inner: Option<Arc<WebPkiServerVerifier>>,
    captured: Mutex<TlsSession>,
}

impl CaptureVerifier {
    fn new(verify: VerifyMode) -> Result<Self, CertError> {
        let inner = match verify {
            VerifyMode::NoVerification => None,
            VerifyMode::Full => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                let verifier = WebPkiServerVerifier::builder_with_provider(
                    Arc::new(roots),
                    Arc::new(ring::default_provider()),
                )
                .build()
                .map_err(|e| CertError::Tls(e.to_string()))?;
                Some(verifier)
            }
        };
        Ok(Self {
            inner,
            captured: Mutex::new(TlsSession::default()),
        })
    }

    fn take_session(&self) -> TlsSession {
        std::mem::take(&mut *self.captured.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ServerCertVerifier for CaptureVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        {
            let mut captured = self.captured.lock().unwrap_or_else(|e| e.into_inner());
            captured.peer_cert = Some(end_entity.as_ref().to_vec());
            captured.ocsp_response = ocsp_response.to_vec();
        }
        match &self.inner {
            Some(verifier) => verifier.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
            None => Ok(ServerCertVerified::assertion()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        match &self.inner {
            Some(verifier) => verifier.verify_tls12_signature(message, cert, dss),
            None => verify_tls12_signature(
                message,
                cert,
                dss,
                &ring::default_provider().signature_verification_algorithms,
            ),
        }
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        match &self.inner {
            Some(verifier) => verifier.verify_tls13_signature(message, cert, dss),
            None => verify_tls13_signature(
                message,
                cert,
                dss,
                &ring::default_provider().signature_verification_algorithms,
            ),
        }
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        match &self.inner {
            Some(verifier) => verifier.supported_verify_schemes(),
            None => ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResolver {
        session: TlsSession,
    }

    #[async_trait]
    impl StaplingResolver for FakeResolver {
        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            _verify: VerifyMode,
        ) -> Result<TlsSession, CertError> {
            Ok(self.session.clone())
        }

        fn revocation_status(&self, session: &TlsSession) -> Result<CertStatus, CertError> {
            if session.ocsp_response.is_empty() {
                return Err(CertError::NoStapledOcsp);
            }
            Ok(CertStatus {
                summary: "status good".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_target_with_port() {
        assert_eq!(
            parse_target("example.com:8443").unwrap(),
            ("example.com".to_string(), 8443)
        );
    }

    #[test]
    fn test_parse_target_default_port() {
        assert_eq!(
            parse_target("example.com").unwrap(),
            ("example.com".to_string(), 443)
        );
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert!(parse_target("").is_err());
        assert!(parse_target(":443").is_err());
        assert!(parse_target("example.com:notaport").is_err());
    }

    #[tokio::test]
    async fn test_cert_probe_reports_status_summary() {
        let probe = CertProbe::new(
            FakeResolver {
                session: TlsSession {
                    peer_cert: Some(vec![0x30]),
                    ocsp_response: vec![1, 2, 3],
                },
            },
            VerifyMode::Full,
        );
        let detail = probe
            .perform(Method::Get, "example.com:443", None)
            .await
            .unwrap();
        assert_eq!(detail, "status good");
    }

    #[tokio::test]
    async fn test_cert_probe_missing_staple_is_failure() {
        let probe = CertProbe::new(
            FakeResolver {
                session: TlsSession::default(),
            },
            VerifyMode::Full,
        );
        let err = probe
            .perform(Method::Get, "example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Rejected(_)));
        assert!(err.to_string().contains("OCSP"));
    }

    #[test]
    fn test_revocation_status_requires_peer_cert() {
        let resolver = TlsResolver::new();
        let session = TlsSession {
            peer_cert: None,
            ocsp_response: vec![1],
        };
        assert!(matches!(
            resolver.revocation_status(&session),
            Err(CertError::NoPeerCertificate)
        ));
    }

    #[test]
    fn test_revocation_status_requires_staple() {
        let resolver = TlsResolver::new();
        let session = TlsSession {
            peer_cert: Some(vec![0x30]),
            ocsp_response: Vec::new(),
        };
        assert!(matches!(
            resolver.revocation_status(&session),
            Err(CertError::NoStapledOcsp)
        ));
    }
}

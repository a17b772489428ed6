//! Direct TLS probe with explicit protocol-version fallback.
//!
//! Attempts a handshake per pinned protocol version, newest to oldest.
//! Certificate validation is disabled throughout: the goal is retrieval of
//! the presented certificate, not trust validation. TLS 1.3 is covered by
//! the auto-negotiating HTTP probe that runs before this one.

use crate::core::{ProbeMethod, ProbeStrategy, RawCertificate};
use crate::probes::{parse_leaf_certificate, ProbeError};
use async_trait::async_trait;
use native_tls::Protocol;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub struct TlsProbe {
    versions: Vec<Protocol>,
    timeout: Duration,
}

impl TlsProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            versions: vec![Protocol::Tlsv12, Protocol::Tlsv11, Protocol::Tlsv10],
            timeout,
        }
    }
}

#[async_trait]
impl ProbeStrategy for TlsProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Tls
    }

    async fn attempt(&self, domain: &str, port: u16) -> Result<RawCertificate, ProbeError> {
        let mut last_error = ProbeError::Other("no TLS protocol versions configured".to_string());

        for version in &self.versions {
            match self.attempt_version(domain, port, *version).await {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    debug!(domain, version = ?version, error = %e, "TLS probe attempt failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

impl TlsProbe {
    async fn attempt_version(
        &self,
        domain: &str,
        port: u16,
        version: Protocol,
    ) -> Result<RawCertificate, ProbeError> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .min_protocol_version(Some(version))
            .max_protocol_version(Some(version))
            .build()
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tcp = timeout(self.timeout, TcpStream::connect((domain, port)))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::from_io(&e))?;

        let stream = timeout(self.timeout, connector.connect(domain, tcp))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;

        let certificate = stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| ProbeError::Handshake(e.to_string()))?
            .ok_or(ProbeError::NoCertificate)?;
        let der = certificate
            .to_der()
            .map_err(|e| ProbeError::BadCertificate(e.to_string()))?;

        parse_leaf_certificate(&der, ProbeMethod::Tls)
    }
}

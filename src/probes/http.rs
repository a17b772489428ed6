//! HTTP HEAD probe: opens a TLS connection implicitly via an HTTP request
//! and reads the negotiated peer certificate off the socket.
//!
//! This is the first network strategy tried because it lets the TLS stack
//! auto-negotiate the highest mutually supported protocol version, which
//! covers servers that refuse the explicitly pinned versions of the direct
//! probe.

use crate::core::{ProbeMethod, ProbeStrategy, RawCertificate};
use crate::probes::{parse_leaf_certificate, ProbeError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const USER_AGENT: &str = "certsentry/0.1 (certificate monitor)";

pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeStrategy for HttpProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Http
    }

    async fn attempt(&self, domain: &str, port: u16) -> Result<RawCertificate, ProbeError> {
        // Trust validation is not the goal; retrieval of the presented
        // certificate is, so invalid chains and hostnames are accepted.
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tcp = timeout(self.timeout, TcpStream::connect((domain, port)))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::from_io(&e))?;

        let mut stream = timeout(self.timeout, connector.connect(domain, tcp))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;

        let request = format!(
            "HEAD / HTTP/1.1\r\nHost: {domain}\r\nUser-Agent: {USER_AGENT}\r\nConnection: close\r\n\r\n"
        );
        timeout(self.timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::from_io(&e))?;

        // The response body is irrelevant; one read confirms the peer
        // actually speaks over the negotiated session.
        let mut buf = [0u8; 512];
        let _ = timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ProbeError::Timeout)?;

        let certificate = stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| ProbeError::Handshake(e.to_string()))?
            .ok_or(ProbeError::NoCertificate)?;
        let der = certificate
            .to_der()
            .map_err(|e| ProbeError::BadCertificate(e.to_string()))?;

        parse_leaf_certificate(&der, ProbeMethod::Http)
    }
}

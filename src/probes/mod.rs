//! Probe strategies for extracting a certificate's validity window.
//!
//! Each submodule implements one [`crate::core::ProbeStrategy`] variant; the
//! resolver iterates them in a fixed precedence order. Shared here are the
//! transport-error taxonomy and the leaf-certificate parsing used by the
//! socket-based probes.

pub mod ct_logs;
pub mod http;
pub mod overrides;
pub mod tls;

use crate::core::{ProbeMethod, RawCertificate};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::prelude::*;

/// Transport-level failure taxonomy surfaced in error records.
///
/// The categories map lower-level error codes into operator-readable
/// diagnostics so "this domain is down" is distinguishable from "this
/// domain rejects our TLS client".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    #[error("connection refused")]
    Refused,
    #[error("connection timed out")]
    Timeout,
    #[error("connection reset by peer")]
    Reset,
    #[error("network or host unreachable")]
    Unreachable,
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
    #[error("peer presented no certificate")]
    NoCertificate,
    #[error("certificate could not be parsed: {0}")]
    BadCertificate(String),
    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    /// Maps an I/O error onto the taxonomy. Unrecognized kinds fall back to
    /// message heuristics, then to the generic bucket.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => ProbeError::Refused,
            ErrorKind::TimedOut => ProbeError::Timeout,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => ProbeError::Reset,
            _ => {
                let message = err.to_string();
                let lower = message.to_lowercase();
                if lower.contains("unreachable") {
                    ProbeError::Unreachable
                } else if lower.contains("failed to lookup address")
                    || lower.contains("name or service not known")
                    || lower.contains("nodename nor servname")
                {
                    ProbeError::Dns(message)
                } else {
                    ProbeError::Other(message)
                }
            }
        }
    }
}

/// Parses the DER-encoded leaf certificate read off a TLS connection.
///
/// Only the fields the monitor cares about are extracted: issuer and
/// subject common names, the validity window, and a SHA-256 fingerprint of
/// the full DER encoding.
pub(crate) fn parse_leaf_certificate(
    der: &[u8],
    method: ProbeMethod,
) -> Result<RawCertificate, ProbeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| ProbeError::BadCertificate(e.to_string()))?;

    let valid_to = asn1_to_utc(&cert.validity().not_after)
        .ok_or_else(|| ProbeError::BadCertificate("notAfter is not representable".to_string()))?;
    let valid_from = asn1_to_utc(&cert.validity().not_before);

    let issuer = common_name(cert.issuer()).or_else(|| Some(cert.issuer().to_string()));
    let subject = common_name(cert.subject());

    Ok(RawCertificate {
        issuer,
        subject,
        valid_from,
        valid_to,
        fingerprint: Some(sha256_fingerprint(der)),
        method,
    })
}

fn asn1_to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}

fn common_name(name: &X509Name) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
}

/// Colon-separated uppercase hex SHA-256 of the DER encoding.
fn sha256_fingerprint(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    digest
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

//! Core domain types and service traits for CertSentry
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::normalize::days_until_expiry;
use crate::probes::ProbeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Identifies which probe strategy produced a certificate observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMethod {
    /// Exact hit in the operator-maintained static override table.
    Override,
    /// HTTP HEAD over TLS with implicit protocol negotiation.
    Http,
    /// Direct TLS handshake with an explicitly pinned protocol version.
    Tls,
    /// Synthesized from the known CDN edge certificate.
    CdnKnown,
    /// Certificate Transparency log lookup.
    CtLogs,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Override => "override",
            ProbeMethod::Http => "http",
            ProbeMethod::Tls => "tls",
            ProbeMethod::CdnKnown => "cdn-known",
            ProbeMethod::CtLogs => "ct-logs",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Error,
}

/// A certificate's validity window as extracted by one probe strategy,
/// before normalization into a [`CertificateRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawCertificate {
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: DateTime<Utc>,
    pub fingerprint: Option<String>,
    pub method: ProbeMethod,
}

/// One immutable observation of a domain's certificate state.
///
/// `status == Success` implies `valid_to` and `days_until_expiry` are
/// present; `status == Error` implies only `domain`, `error_message` and
/// `observed_at` carry data. Records are appended to history and never
/// updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificateRecord {
    pub domain: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ProbeMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// True for successful records whose remaining lifetime is inside the
    /// warning window. Partition is by `days_until_expiry <= warning_days`;
    /// an already-expired certificate (0 days) counts as expiring.
    pub fn is_expiring(&self, warning_days: u32) -> bool {
        self.status == CheckStatus::Success
            && self
                .days_until_expiry
                .map(|days| days <= warning_days)
                .unwrap_or(false)
    }
}

/// Aggregate of one full domain sweep.
///
/// `records` preserves the configured domain order. The invariant
/// `total == healthy + expiring + failed` holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepResult {
    pub total: usize,
    pub healthy: usize,
    pub expiring: usize,
    pub failed: usize,
    pub warning_days: u32,
    pub records: Vec<CertificateRecord>,
    pub sweep_time: DateTime<Utc>,
}

impl SweepResult {
    /// Partitions the given records into the healthy/expiring/failed counts.
    pub fn from_records(
        records: Vec<CertificateRecord>,
        warning_days: u32,
        sweep_time: DateTime<Utc>,
    ) -> Self {
        let mut healthy = 0;
        let mut expiring = 0;
        let mut failed = 0;
        for record in &records {
            match record.status {
                CheckStatus::Success if record.is_expiring(warning_days) => expiring += 1,
                CheckStatus::Success => healthy += 1,
                CheckStatus::Error => failed += 1,
            }
        }
        Self {
            total: records.len(),
            healthy,
            expiring,
            failed,
            warning_days,
            records,
            sweep_time,
        }
    }

    /// Records inside the warning window, in sweep order.
    pub fn expiring_records(&self) -> Vec<&CertificateRecord> {
        self.records
            .iter()
            .filter(|r| r.is_expiring(self.warning_days))
            .collect()
    }

    /// Records whose resolution failed, in sweep order.
    pub fn failed_records(&self) -> Vec<&CertificateRecord> {
        self.records
            .iter()
            .filter(|r| r.status == CheckStatus::Error)
            .collect()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// One method for obtaining a certificate's validity window from a domain.
///
/// Implementations must convert every failure into a [`ProbeError`]; the
/// resolver treats any error as "try the next strategy".
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    /// The tag recorded on records produced by this strategy.
    fn method(&self) -> ProbeMethod;

    /// Attempts to extract the certificate presented for `domain`.
    async fn attempt(&self, domain: &str, port: u16) -> Result<RawCertificate, ProbeError>;
}

/// Resolves domain names to their IPv4/IPv6 addresses.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolves a domain to its A-record addresses.
    ///
    /// # Returns
    /// * `Ok(addrs)` with at least one address on successful resolution
    /// * `Err` for DNS errors including NXDOMAIN, timeouts, server errors
    async fn resolve_v4(&self, domain: &str) -> anyhow::Result<Vec<IpAddr>>;
}

/// Classifies whether a domain is likely fronted by a known CDN.
#[async_trait]
pub trait ProxyDetector: Send + Sync {
    /// Best-effort classification; false negatives are acceptable.
    /// Must not block longer than the configured DNS budget.
    async fn is_likely_proxied(&self, domain: &str) -> bool;
}

/// Append-only store for resolution history (storage collaborator).
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Appends one observation. Rows are immutable once written.
    async fn append(&self, record: &CertificateRecord) -> anyhow::Result<()>;

    /// The most recent record for each domain ever observed, used to
    /// reconstruct status when no in-memory sweep cache exists.
    async fn latest_per_domain(&self) -> anyhow::Result<Vec<CertificateRecord>>;
}

/// Durable claim table backing the idempotent dispatch gate.
///
/// `try_claim` must be a storage-level atomic conditional insert, not an
/// application-level check-then-act.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Atomic insert-if-absent. Returns true iff this caller now owns the
    /// window and must perform the send.
    async fn try_claim(&self, window_key: &str) -> anyhow::Result<bool>;

    /// Records the confirmed send time on an existing claim.
    async fn mark_sent(&self, window_key: &str, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Deletes a claim, permitting a fresh claim for the same window.
    async fn release(&self, window_key: &str) -> anyhow::Result<()>;
}

/// Outbound email delivery (email collaborator).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends an expiry alert listing the expiring records.
    async fn send_alert(
        &self,
        expiring: &[CertificateRecord],
        recipients: &[String],
        warning_days: u32,
    ) -> anyhow::Result<()>;

    /// Sends the daily summary report for one sweep.
    async fn send_daily_report(
        &self,
        recipients: &[String],
        sweep: &SweepResult,
    ) -> anyhow::Result<()>;
}

/// Helper used by every strategy to turn a raw probe result into the
/// canonical record shape. Days-to-expiry is computed here and nowhere else.
pub fn success_record(domain: &str, raw: RawCertificate, now: DateTime<Utc>) -> CertificateRecord {
    CertificateRecord {
        domain: domain.to_string(),
        status: CheckStatus::Success,
        issuer: raw.issuer,
        subject: raw.subject.or_else(|| Some(domain.to_string())),
        valid_from: raw.valid_from,
        valid_to: Some(raw.valid_to),
        days_until_expiry: Some(days_until_expiry(raw.valid_to, now)),
        fingerprint: raw.fingerprint,
        method: Some(raw.method),
        error_message: None,
        observed_at: now,
    }
}

/// Canonical error record: carries only the diagnostic, never partial
/// certificate data.
pub fn error_record(
    domain: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> CertificateRecord {
    CertificateRecord {
        domain: domain.to_string(),
        status: CheckStatus::Error,
        issuer: None,
        subject: None,
        valid_from: None,
        valid_to: None,
        days_until_expiry: None,
        fingerprint: None,
        method: None,
        error_message: Some(message.into()),
        observed_at: now,
    }
}

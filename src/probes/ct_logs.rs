//! Certificate Transparency log lookups.
//!
//! Queries a primary issuance API (Cert Spotter shape) and falls back to a
//! secondary one (crt.sh shape). Both are filtered to entries whose DNS
//! name list contains the exact domain; the entry with the latest
//! `not_after` wins. A CT hit reflects issuance, not liveness, so this is
//! the last resort after every direct strategy has failed.

use crate::core::{ProbeMethod, ProbeStrategy, RawCertificate};
use crate::probes::ProbeError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct CtLogProbe {
    client: reqwest::Client,
    primary_base: String,
    secondary_base: String,
}

/// One issuance entry from the primary (Cert Spotter shaped) API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Issuance {
    #[serde(default)]
    pub dns_names: Vec<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub issuer: Option<IssuanceIssuer>,
    pub cert_sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IssuanceIssuer {
    pub friendly_name: Option<String>,
    pub name: Option<String>,
}

/// One row from the secondary (crt.sh shaped) API. Timestamps come back
/// without a zone and are treated as UTC.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CrtShEntry {
    #[serde(default)]
    pub name_value: String,
    pub not_before: Option<String>,
    pub not_after: Option<String>,
    pub issuer_name: Option<String>,
}

impl CtLogProbe {
    pub fn new(
        primary_base: String,
        secondary_base: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("certsentry/0.1 (certificate monitor)")
            .build()?;
        Ok(Self {
            client,
            primary_base,
            secondary_base,
        })
    }

    async fn query_primary(&self, domain: &str) -> Result<RawCertificate, ProbeError> {
        let url = format!("{}/v1/issuances", self.primary_base.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("domain", domain),
                ("include_subdomains", "false"),
                ("match_wildcards", "false"),
                ("expand", "dns_names"),
                ("expand", "issuer"),
            ])
            .send()
            .await
            .map_err(reqwest_error)?
            .error_for_status()
            .map_err(reqwest_error)?;

        let issuances: Vec<Issuance> = response.json().await.map_err(reqwest_error)?;
        select_issuance(issuances, domain)
            .ok_or_else(|| ProbeError::Other(format!("no CT issuances match {domain}")))
    }

    async fn query_secondary(&self, domain: &str) -> Result<RawCertificate, ProbeError> {
        let url = format!("{}/", self.secondary_base.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("q", domain), ("output", "json")])
            .send()
            .await
            .map_err(reqwest_error)?
            .error_for_status()
            .map_err(reqwest_error)?;

        let entries: Vec<CrtShEntry> = response.json().await.map_err(reqwest_error)?;
        select_crtsh_entry(entries, domain)
            .ok_or_else(|| ProbeError::Other(format!("no CT entries match {domain}")))
    }
}

#[async_trait]
impl ProbeStrategy for CtLogProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::CtLogs
    }

    async fn attempt(&self, domain: &str, _port: u16) -> Result<RawCertificate, ProbeError> {
        match self.query_primary(domain).await {
            Ok(raw) => Ok(raw),
            Err(primary_err) => {
                debug!(domain, error = %primary_err, "primary CT log lookup failed, trying secondary");
                metrics::counter!("ct_lookup_fallbacks_total").increment(1);
                self.query_secondary(domain).await
            }
        }
    }
}

/// Picks the matching issuance with the latest `not_after`.
pub(crate) fn select_issuance(issuances: Vec<Issuance>, domain: &str) -> Option<RawCertificate> {
    issuances
        .into_iter()
        .filter(|i| i.dns_names.iter().any(|name| name == domain))
        .filter_map(|i| {
            let not_after = i.not_after?;
            Some((i, not_after))
        })
        .max_by_key(|(_, not_after)| *not_after)
        .map(|(issuance, not_after)| RawCertificate {
            issuer: issuance
                .issuer
                .and_then(|i| i.friendly_name.or(i.name)),
            subject: Some(domain.to_string()),
            valid_from: issuance.not_before,
            valid_to: not_after,
            fingerprint: issuance.cert_sha256,
            method: ProbeMethod::CtLogs,
        })
}

/// Picks the matching crt.sh row with the latest `not_after`. `name_value`
/// holds one DNS name per line.
pub(crate) fn select_crtsh_entry(entries: Vec<CrtShEntry>, domain: &str) -> Option<RawCertificate> {
    entries
        .into_iter()
        .filter(|e| e.name_value.lines().any(|name| name.trim() == domain))
        .filter_map(|e| {
            let not_after = parse_ct_timestamp(e.not_after.as_deref()?)?;
            Some((e, not_after))
        })
        .max_by_key(|(_, not_after)| *not_after)
        .map(|(entry, not_after)| RawCertificate {
            issuer: entry.issuer_name,
            subject: Some(domain.to_string()),
            valid_from: entry
                .not_before
                .as_deref()
                .and_then(parse_ct_timestamp),
            valid_to: not_after,
            fingerprint: None,
            method: ProbeMethod::CtLogs,
        })
}

fn parse_ct_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn reqwest_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Other(err.to_string())
    }
}

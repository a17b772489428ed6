//! Static certificate overrides.
//!
//! Some domains are verified out-of-band to be unreachable via automated
//! probing (strict reverse proxies, CDN edges that refuse direct
//! inspection). Operators record the browser-visible certificate for those
//! domains in configuration; this module holds the resulting immutable
//! tables loaded at startup.

use crate::core::{ProbeMethod, RawCertificate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An operator-recorded certificate for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCertificate {
    pub issuer: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: DateTime<Utc>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl StaticCertificate {
    pub fn to_raw(&self, domain: &str, method: ProbeMethod) -> RawCertificate {
        RawCertificate {
            issuer: Some(self.issuer.clone()),
            subject: self.subject.clone().or_else(|| Some(domain.to_string())),
            valid_from: self.not_before,
            valid_to: self.not_after,
            fingerprint: self.fingerprint.clone(),
            method,
        }
    }
}

/// Configuration entry binding a domain to its static certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub domain: String,
    #[serde(flatten)]
    pub certificate: StaticCertificate,
}

/// Immutable exact-match table consulted before any network I/O.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, StaticCertificate>,
}

impl OverrideTable {
    pub fn new(entries: Vec<OverrideEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.domain, e.certificate))
                .collect(),
        }
    }

    pub fn get(&self, domain: &str) -> Option<&StaticCertificate> {
        self.entries.get(domain)
    }
}

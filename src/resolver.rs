//! Certificate resolution with layered strategy fallback.
//!
//! A resolution attempt walks a fixed precedence order: hostname
//! validation, the static override table, the direct probes (HTTP first,
//! then pinned-version TLS), the CDN-known short-circuit for domains
//! classified as proxied, and finally the Certificate Transparency logs.
//! Resolution never returns an error to the caller; every failure mode
//! collapses into an error record so one broken domain cannot abort a
//! sweep.

use crate::core::{
    error_record, success_record, CertificateRecord, ProbeMethod, ProbeStrategy, ProxyDetector,
};
use crate::domain::validate_hostname;
use crate::probes::overrides::{OverrideTable, StaticCertificate};
use crate::probes::ProbeError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CertificateResolver {
    overrides: OverrideTable,
    proxy_detector: Arc<dyn ProxyDetector>,
    direct_probes: Vec<Arc<dyn ProbeStrategy>>,
    ct_probe: Arc<dyn ProbeStrategy>,
    cdn_known: Option<StaticCertificate>,
    port: u16,
}

impl CertificateResolver {
    pub fn new(
        overrides: OverrideTable,
        proxy_detector: Arc<dyn ProxyDetector>,
        direct_probes: Vec<Arc<dyn ProbeStrategy>>,
        ct_probe: Arc<dyn ProbeStrategy>,
        cdn_known: Option<StaticCertificate>,
        port: u16,
    ) -> Self {
        Self {
            overrides,
            proxy_detector,
            direct_probes,
            ct_probe,
            cdn_known,
            port,
        }
    }

    /// Resolves one domain to a certificate record.
    ///
    /// Always produces a record; failures surface as error records with a
    /// diagnostic from the most informative failed strategy.
    pub async fn resolve(&self, domain: &str) -> CertificateRecord {
        let now = Utc::now();

        if let Err(reason) = validate_hostname(domain) {
            warn!(domain, reason, "skipping invalid hostname");
            return error_record(domain, format!("invalid hostname: {reason}"), now);
        }

        if let Some(cert) = self.overrides.get(domain) {
            debug!(domain, "serving certificate from static override");
            metrics::counter!("resolutions_total", "method" => "override").increment(1);
            return success_record(domain, cert.to_raw(domain, ProbeMethod::Override), now);
        }

        let proxied = self.proxy_detector.is_likely_proxied(domain).await;

        let mut direct_errors: Vec<(ProbeMethod, ProbeError)> = Vec::new();
        for probe in &self.direct_probes {
            match probe.attempt(domain, self.port).await {
                Ok(raw) => {
                    debug!(domain, method = %probe.method(), "direct probe succeeded");
                    metrics::counter!("resolutions_total", "method" => probe.method().as_str())
                        .increment(1);
                    return success_record(domain, raw, Utc::now());
                }
                Err(e) => {
                    debug!(domain, method = %probe.method(), error = %e, "direct probe failed");
                    direct_errors.push((probe.method(), e));
                }
            }
        }

        // Proxied domains whose edge refuses direct inspection get the
        // operator-recorded edge certificate instead of a CT guess.
        if proxied {
            if let Some(cert) = &self.cdn_known {
                info!(domain, "direct probes failed behind known CDN, using edge certificate");
                metrics::counter!("resolutions_total", "method" => "cdn-known").increment(1);
                return success_record(
                    domain,
                    cert.to_raw(domain, ProbeMethod::CdnKnown),
                    Utc::now(),
                );
            }
        }

        match self.ct_probe.attempt(domain, self.port).await {
            Ok(raw) => {
                info!(domain, "direct probes failed, resolved via CT logs");
                metrics::counter!("resolutions_total", "method" => "ct-logs").increment(1);
                return success_record(domain, raw, Utc::now());
            }
            Err(ct_err) => {
                let diagnostic = pick_diagnostic(&direct_errors, &ct_err);
                warn!(domain, error = %diagnostic, "all resolution strategies failed");
                metrics::counter!("resolutions_total", "method" => "error").increment(1);
                error_record(domain, diagnostic, Utc::now())
            }
        }
    }
}

/// The direct TLS error is the most actionable diagnostic: it describes
/// the actual endpoint rather than our HTTP client or a log mirror.
fn pick_diagnostic(direct_errors: &[(ProbeMethod, ProbeError)], ct_err: &ProbeError) -> String {
    direct_errors
        .iter()
        .find(|(method, _)| *method == ProbeMethod::Tls)
        .or_else(|| direct_errors.first())
        .map(|(_, e)| e.to_string())
        .unwrap_or_else(|| ct_err.to_string())
}

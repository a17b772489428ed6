//! Shared test helpers: scripted probe, proxy, and mailer doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use certsentry::core::{
    CertificateRecord, Mailer, ProbeMethod, ProbeStrategy, ProxyDetector, RawCertificate,
    SweepResult,
};
use certsentry::probes::ProbeError;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A raw certificate expiring the given number of days from now.
pub fn raw_cert(days_from_now: i64, method: ProbeMethod) -> RawCertificate {
    let now = Utc::now();
    RawCertificate {
        issuer: Some("Test CA".to_string()),
        subject: None,
        valid_from: Some(now - ChronoDuration::days(30)),
        valid_to: now + ChronoDuration::days(days_from_now),
        fingerprint: Some("AA:BB".to_string()),
        method,
    }
}

/// A probe strategy scripted per domain. Unscripted domains fail, and
/// every attempt is counted so tests can assert which strategies ran.
pub struct MockProbe {
    method: ProbeMethod,
    outcomes: Mutex<HashMap<String, Result<RawCertificate, ProbeError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockProbe {
    pub fn new(method: ProbeMethod) -> Self {
        Self {
            method,
            outcomes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn succeed_for(self, domain: &str, raw: RawCertificate) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(domain.to_string(), Ok(raw));
        self
    }

    pub fn fail_for(self, domain: &str, error: ProbeError) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(domain.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeStrategy for MockProbe {
    fn method(&self) -> ProbeMethod {
        self.method
    }

    async fn attempt(&self, domain: &str, _port: u16) -> Result<RawCertificate, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Other(format!("unscripted domain {domain}"))))
    }
}

/// Fixed-answer proxy classifier.
pub struct MockProxy {
    proxied: bool,
}

impl MockProxy {
    pub fn new(proxied: bool) -> Self {
        Self { proxied }
    }
}

#[async_trait]
impl ProxyDetector for MockProxy {
    async fn is_likely_proxied(&self, _domain: &str) -> bool {
        self.proxied
    }
}

/// Records every send; can be told to fail.
#[derive(Default)]
pub struct MockMailer {
    pub alerts: Mutex<Vec<Vec<CertificateRecord>>>,
    pub reports: Mutex<Vec<SweepResult>>,
    fail: AtomicBool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_alert(
        &self,
        expiring: &[CertificateRecord],
        _recipients: &[String],
        _warning_days: u32,
    ) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("smtp unavailable");
        }
        self.alerts.lock().unwrap().push(expiring.to_vec());
        Ok(())
    }

    async fn send_daily_report(
        &self,
        _recipients: &[String],
        sweep: &SweepResult,
    ) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("smtp unavailable");
        }
        self.reports.lock().unwrap().push(sweep.clone());
        Ok(())
    }
}

//! Component wiring, decoupled from the entry point.

use crate::config::Config;
use crate::core::{ClaimStore, HistorySink, Mailer, ProbeStrategy};
use crate::dispatch::{DispatchGate, ReportDispatcher};
use crate::dns::HickoryDnsResolver;
use crate::notification::{LogMailer, SmtpMailer};
use crate::probes::ct_logs::CtLogProbe;
use crate::probes::http::HttpProbe;
use crate::probes::overrides::OverrideTable;
use crate::probes::tls::TlsProbe;
use crate::proxy::ProxyHeuristic;
use crate::resolver::CertificateResolver;
use crate::scheduler::{parse_timezone, Scheduler};
use crate::storage::{MemoryClaimStore, MemoryHistory};
use crate::sweep::SweepRunner;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The fully wired application.
pub struct App {
    scheduler: Arc<Scheduler>,
    history: Arc<MemoryHistory>,
}

impl App {
    /// Builds every component from configuration. Overridable collaborators
    /// (mailer, history, claim store) default to the configured ones.
    pub fn build(config: &Config) -> Result<Self> {
        let tls_timeout = Duration::from_secs(config.probe.tls_timeout_secs);
        let dns_timeout = Duration::from_secs(config.probe.dns_timeout_secs);

        let dns = Arc::new(HickoryDnsResolver::new(dns_timeout)?);
        let proxy = Arc::new(ProxyHeuristic::new(
            dns,
            config.cdn.networks.clone(),
            config.cdn.domain_suffixes.clone(),
            dns_timeout,
        ));

        let direct_probes: Vec<Arc<dyn ProbeStrategy>> = vec![
            Arc::new(HttpProbe::new(tls_timeout)),
            Arc::new(TlsProbe::new(tls_timeout)),
        ];
        let ct_probe: Arc<dyn ProbeStrategy> = Arc::new(CtLogProbe::new(
            config.probe.ct.primary_url.clone(),
            config.probe.ct.secondary_url.clone(),
            Duration::from_secs(config.probe.ct.timeout_secs),
        )?);

        let resolver = Arc::new(CertificateResolver::new(
            OverrideTable::new(config.overrides.clone()),
            proxy,
            direct_probes,
            ct_probe,
            config.cdn.known_certificate.clone(),
            config.probe.port,
        ));

        let history = Arc::new(MemoryHistory::new());
        let runner = Arc::new(SweepRunner::new(
            resolver,
            Arc::clone(&history) as Arc<dyn HistorySink>,
            config.domains.clone(),
            config.warning_days,
            config.concurrency,
        ));

        let mailer: Arc<dyn Mailer> = if config.email.enabled {
            Arc::new(SmtpMailer::new(
                &config.email.smtp_host,
                config.email.smtp_port,
                &config.email.username,
                &config.email.password,
                &config.email.from,
            )?)
        } else {
            info!("email disabled, notifications will be logged only");
            Arc::new(LogMailer)
        };

        let claims: Arc<dyn ClaimStore> = Arc::new(MemoryClaimStore::new());
        let gate = DispatchGate::new(claims, config.email.allow_same_day_resend);
        let tz = parse_timezone(&config.schedule.timezone)?;
        let dispatcher = Arc::new(ReportDispatcher::new(
            gate,
            mailer,
            config.email.recipients.clone(),
            config.email.daily_report,
            tz,
        ));

        let scheduler = Arc::new(Scheduler::new(runner, dispatcher));
        Ok(Self { scheduler, history })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn history(&self) -> &Arc<MemoryHistory> {
        &self.history
    }
}

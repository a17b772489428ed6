//! Full-list certificate sweeps.

use crate::core::{HistorySink, SweepResult};
use crate::resolver::CertificateResolver;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Resolves every configured domain and aggregates the results.
///
/// Domains resolve concurrently up to the configured limit, but the result
/// list always comes back in configured order.
pub struct SweepRunner {
    resolver: Arc<CertificateResolver>,
    history: Arc<dyn HistorySink>,
    domains: Vec<String>,
    warning_days: u32,
    concurrency: usize,
}

impl SweepRunner {
    pub fn new(
        resolver: Arc<CertificateResolver>,
        history: Arc<dyn HistorySink>,
        domains: Vec<String>,
        warning_days: u32,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            history,
            domains,
            warning_days,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self) -> SweepResult {
        let started = Instant::now();
        info!(domains = self.domains.len(), "starting certificate sweep");

        let records: Vec<_> = stream::iter(0..self.domains.len())
            .map(|idx| self.resolver.resolve(&self.domains[idx]))
            .buffered(self.concurrency)
            .collect()
            .await;

        for record in &records {
            if let Err(e) = self.history.append(record).await {
                error!(domain = %record.domain, error = %e, "failed to record sweep observation");
            }
        }

        let sweep = SweepResult::from_records(records, self.warning_days, Utc::now());
        info!(
            total = sweep.total,
            healthy = sweep.healthy,
            expiring = sweep.expiring,
            failed = sweep.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "certificate sweep finished"
        );
        metrics::counter!("sweeps_total").increment(1);
        metrics::gauge!("sweep_expiring_domains").set(sweep.expiring as f64);
        metrics::gauge!("sweep_failed_domains").set(sweep.failed as f64);
        sweep
    }
}

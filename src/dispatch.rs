//! Idempotent notification dispatch.
//!
//! Every outbound email is guarded by a per-calendar-day window claim.
//! Claiming is an atomic insert-if-absent in the [`ClaimStore`], so a
//! restart mid-day, overlapping trigger firings, or two replicas sharing a
//! store all collapse to at most one send per window. A failed send leaves
//! the window claimed: there is no automatic retry inside a window, only
//! the operator resend path.

use crate::core::{ClaimStore, Mailer, SweepResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Daily-report window key for the calendar day containing `now` in `tz`.
pub fn report_window_key(now: DateTime<Utc>, tz: Tz) -> String {
    format!("report:{}", now.with_timezone(&tz).format("%Y-%m-%d"))
}

/// Expiry-alert window key for the calendar day containing `now` in `tz`.
pub fn alert_window_key(now: DateTime<Utc>, tz: Tz) -> String {
    format!("alert:{}", now.with_timezone(&tz).format("%Y-%m-%d"))
}

/// Claim-table front end shared by all dispatch paths.
pub struct DispatchGate {
    store: Arc<dyn ClaimStore>,
    allow_same_day_resend: bool,
}

impl DispatchGate {
    pub fn new(store: Arc<dyn ClaimStore>, allow_same_day_resend: bool) -> Self {
        Self {
            store,
            allow_same_day_resend,
        }
    }

    /// Attempts to claim a window. Returns true iff the caller owns the
    /// window and must perform the send.
    ///
    /// Scheduled callers never displace an existing claim. An operator
    /// request may, when resends are enabled: the stale claim is released
    /// and the window re-claimed, still atomically at the store level.
    pub async fn try_acquire(&self, window_key: &str, operator_requested: bool) -> Result<bool> {
        if self.store.try_claim(window_key).await? {
            return Ok(true);
        }
        if operator_requested && self.allow_same_day_resend {
            info!(window_key, "resending over an existing claim");
            self.store.release(window_key).await?;
            return self.store.try_claim(window_key).await;
        }
        Ok(false)
    }

    /// Records the confirmed send time on the claim.
    pub async fn confirm_sent(&self, window_key: &str) -> Result<()> {
        self.store.mark_sent(window_key, Utc::now()).await
    }
}

/// Sends expiry alerts and daily reports through the dispatch gate.
pub struct ReportDispatcher {
    gate: DispatchGate,
    mailer: Arc<dyn Mailer>,
    recipients: Vec<String>,
    report_enabled: bool,
    tz: Tz,
}

impl ReportDispatcher {
    pub fn new(
        gate: DispatchGate,
        mailer: Arc<dyn Mailer>,
        recipients: Vec<String>,
        report_enabled: bool,
        tz: Tz,
    ) -> Self {
        Self {
            gate,
            mailer,
            recipients,
            report_enabled,
            tz,
        }
    }

    /// Sends the expiry alert for a sweep, at most once per calendar day.
    /// A sweep with nothing expiring sends nothing and claims nothing.
    pub async fn dispatch_alert(&self, sweep: &SweepResult) -> Result<()> {
        let expiring: Vec<_> = sweep.expiring_records().into_iter().cloned().collect();
        if expiring.is_empty() {
            debug!("no certificates inside the warning window, skipping alert");
            return Ok(());
        }
        if self.recipients.is_empty() {
            debug!("no alert recipients configured, skipping alert");
            return Ok(());
        }

        let key = alert_window_key(Utc::now(), self.tz);
        if !self.gate.try_acquire(&key, false).await? {
            debug!(window_key = %key, "alert window already claimed, skipping");
            return Ok(());
        }

        match self
            .mailer
            .send_alert(&expiring, &self.recipients, sweep.warning_days)
            .await
        {
            Ok(()) => {
                info!(window_key = %key, expiring = expiring.len(), "expiry alert sent");
                metrics::counter!("notifications_sent_total", "kind" => "alert").increment(1);
                self.gate.confirm_sent(&key).await
            }
            Err(e) => {
                // Window stays claimed; the next calendar day gets a fresh one.
                error!(window_key = %key, error = %e, "expiry alert send failed");
                metrics::counter!("notifications_failed_total", "kind" => "alert").increment(1);
                Ok(())
            }
        }
    }

    /// Sends the daily summary report, at most once per calendar day.
    /// Scheduled callers honor the report-enabled flag; operator requests
    /// bypass it and may resend when resends are enabled.
    pub async fn dispatch_daily_report(
        &self,
        sweep: &SweepResult,
        operator_requested: bool,
    ) -> Result<()> {
        if !self.report_enabled && !operator_requested {
            debug!("daily report disabled, skipping");
            return Ok(());
        }
        if self.recipients.is_empty() {
            debug!("no report recipients configured, skipping daily report");
            return Ok(());
        }

        let key = report_window_key(Utc::now(), self.tz);
        if !self.gate.try_acquire(&key, operator_requested).await? {
            debug!(window_key = %key, "report window already claimed, skipping");
            return Ok(());
        }

        match self.mailer.send_daily_report(&self.recipients, sweep).await {
            Ok(()) => {
                info!(window_key = %key, total = sweep.total, "daily report sent");
                metrics::counter!("notifications_sent_total", "kind" => "report").increment(1);
                self.gate.confirm_sent(&key).await
            }
            Err(e) => {
                error!(window_key = %key, error = %e, "daily report send failed");
                metrics::counter!("notifications_failed_total", "kind" => "report").increment(1);
                Ok(())
            }
        }
    }
}
